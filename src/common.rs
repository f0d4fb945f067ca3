// Licensed under the Apache-2.0 license

//! Shared infrastructure for the driver modules: the logging seam and a
//! cycle-counting delay provider.

use core::fmt::Arguments;

use embedded_hal::delay::DelayNs;
use embedded_io::Write;

use crate::uart::UartController;

/// Logging seam used by drivers and demos.
///
/// Drivers take a `Logger` instead of a concrete sink so production builds
/// can run silent (`NoOpLogger`) while bring-up builds trace to the console.
pub trait Logger {
    fn log(&mut self, args: Arguments<'_>);
}

/// Logger that discards everything.
#[derive(Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&mut self, _args: Arguments<'_>) {}
}

/// Logger backed by the console UART.
pub struct UartLogger {
    uart: UartController,
}

impl UartLogger {
    #[must_use]
    pub fn new(uart: UartController) -> Self {
        Self { uart }
    }
}

impl Logger for UartLogger {
    fn log(&mut self, args: Arguments<'_>) {
        // Dropping trace output on a console error beats wedging the driver.
        let _ = self.uart.write_fmt(args);
        let _ = self.uart.write_all(b"\r\n");
    }
}

/// Trace a fatal condition and halt, the BSP's only failure recovery.
pub fn fatal<L: Logger>(logger: &mut L, args: Arguments<'_>) -> ! {
    logger.log(format_args!("-F- fatal:"));
    logger.log(args);
    loop {
        core::hint::spin_loop();
    }
}

/// Busy-wait delay provider. Calibration is coarse; the drivers only use it
/// for settle times where "at least this long" is what matters.
#[derive(Clone, Copy, Default)]
pub struct CycleDelay;

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        for _ in 0..ns {
            core::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CollectLogger(String);

    impl Logger for CollectLogger {
        fn log(&mut self, args: Arguments<'_>) {
            use core::fmt::Write;
            write!(self.0, "{args}|").unwrap();
        }
    }

    #[test]
    fn noop_logger_accepts_anything() {
        let mut logger = NoOpLogger;
        logger.log(format_args!("{} {}", 1, "two"));
    }

    #[test]
    fn logger_receives_formatted_records() {
        let mut logger = CollectLogger(String::new());
        logger.log(format_args!("mck={}", 166_000_000));
        logger.log(format_args!("ok"));
        assert_eq!(logger.0, "mck=166000000|ok|");
    }
}
