// Licensed under the Apache-2.0 license

//! Demo applications exercising the drivers from a serial console.

pub mod qspi_aesb;
pub mod serialflash;

use crate::console::{LineBuffer, LineEvent};
use crate::mutex::Spinlock;
use crate::uart::UartController;

/// Command line capacity, including the longest write command.
pub const COMMAND_CAPACITY: usize = 64;

/// Command buffer shared between the UART receive interrupt and the demo
/// main loop.
pub static COMMAND_LINE: Spinlock<LineBuffer<COMMAND_CAPACITY>> = Spinlock::new(LineBuffer::new());

/// UART receive interrupt body: drain received bytes into the shared
/// buffer and echo. Skips the burst when the main loop holds the lock;
/// the UART holding register keeps the byte until the next interrupt.
pub fn console_rx_interrupt(uart: &mut UartController) {
    let Some(mut line) = COMMAND_LINE.try_lock() else {
        return;
    };
    while uart.is_rx_ready() {
        match line.push(uart.read_byte()) {
            LineEvent::Echo(byte) => uart.write_byte(byte),
            LineEvent::Backspace => {
                for byte in b"\x08 \x08" {
                    uart.write_byte(*byte);
                }
            }
            LineEvent::Complete => {
                uart.write_byte(b'\r');
                uart.write_byte(b'\n');
            }
            LineEvent::Overflow => {
                for byte in b"\r\n-W- line too long, dropped\r\n" {
                    uart.write_byte(*byte);
                }
            }
            LineEvent::Ignored => {}
        }
    }
}

/// Take a completed command line out of the shared buffer, if any.
#[must_use]
pub fn take_command_line() -> Option<heapless::String<COMMAND_CAPACITY>> {
    let mut line = COMMAND_LINE.try_lock()?;
    if !line.is_complete() {
        return None;
    }
    let mut taken = heapless::String::new();
    let _ = taken.push_str(line.line());
    line.reset();
    Some(taken)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_command_line_round_trip() {
        {
            let mut line = COMMAND_LINE.try_lock().unwrap();
            line.reset();
            for b in b"a status" {
                line.push(*b);
            }
            line.push(b'\r');
        }
        let taken = take_command_line().unwrap();
        assert_eq!(taken.as_str(), "a status");
        // Buffer is ready for the next line
        assert!(take_command_line().is_none());
    }
}
