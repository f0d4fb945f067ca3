// Licensed under the Apache-2.0 license

//! Two-wire interface (I2C) driver: master transfers with optional internal
//! device addressing, and a target (slave) responder behind the
//! `twi_target` feature.

mod common;
mod controller;

pub use common::{clock_waveform, ClockWaveform, Error, TwiConfig, TwiConfigBuilder, TwiSpeed};
pub use controller::TwiController;
