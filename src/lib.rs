// Licensed under the Apache-2.0 license

// Keep panic-prone patterns out of production code - tests are exempt
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::indexing_slicing))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(not(test), no_std)]
pub mod aesb;
pub mod chip;
pub mod common;
pub mod console;
pub mod demos;
pub mod mutex;
pub mod pio;
pub mod pmc;
pub mod qspi;
pub mod spi;
pub mod twi;
pub mod uart;
