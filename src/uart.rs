// Licensed under the Apache-2.0 license

//! Console UART driver: polled transmit and receive, a receive interrupt
//! switch for the command buffer, and [`embedded_io`] adapters.

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub UartRegisters {
        (0x00 => cr: WriteOnly<u32, CR::Register>),
        (0x04 => mr: ReadWrite<u32, MR::Register>),
        (0x08 => ier: WriteOnly<u32, SR::Register>),
        (0x0c => idr: WriteOnly<u32, SR::Register>),
        (0x10 => imr: ReadOnly<u32, SR::Register>),
        (0x14 => sr: ReadOnly<u32, SR::Register>),
        (0x18 => rhr: ReadOnly<u32>),
        (0x1c => thr: WriteOnly<u32>),
        (0x20 => brgr: ReadWrite<u32, BRGR::Register>),
        (0x24 => @END),
    }
}

register_bitfields![u32,
    CR [
        RSTRX OFFSET(2) NUMBITS(1) [],
        RSTTX OFFSET(3) NUMBITS(1) [],
        RXEN OFFSET(4) NUMBITS(1) [],
        RXDIS OFFSET(5) NUMBITS(1) [],
        TXEN OFFSET(6) NUMBITS(1) [],
        TXDIS OFFSET(7) NUMBITS(1) [],
        RSTSTA OFFSET(8) NUMBITS(1) [],
    ],
    MR [
        PAR OFFSET(9) NUMBITS(3) [
            Even = 0,
            Odd = 1,
            Space = 2,
            Mark = 3,
            None = 4
        ],
    ],
    SR [
        RXRDY OFFSET(0) NUMBITS(1) [],
        TXRDY OFFSET(1) NUMBITS(1) [],
        OVRE OFFSET(5) NUMBITS(1) [],
        FRAME OFFSET(6) NUMBITS(1) [],
        PARE OFFSET(7) NUMBITS(1) [],
        TXEMPTY OFFSET(9) NUMBITS(1) [],
    ],
    BRGR [
        CD OFFSET(0) NUMBITS(16) [],
    ],
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The baud rate divisor is out of the 16-bit range (or zero).
    UnreachableBaudRate,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Parity {
    Even,
    Odd,
    Space,
    Mark,
    None,
}

#[derive(Copy, Clone, Debug)]
pub struct UartConfig {
    pub baud_rate: u32,
    pub parity: Parity,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            parity: Parity::None,
        }
    }
}

/// Clock divisor for a requested baud rate. The oversampling factor is
/// fixed at 16.
pub fn baud_divisor(periph_hz: u32, baud: u32) -> Result<u32, Error> {
    if baud == 0 {
        return Err(Error::UnreachableBaudRate);
    }
    let oversampled = baud.checked_mul(16).ok_or(Error::UnreachableBaudRate)?;
    let cd = periph_hz / oversampled;
    if cd == 0 || cd > 0xffff {
        return Err(Error::UnreachableBaudRate);
    }
    Ok(cd)
}

pub struct UartController {
    base: usize,
}

impl UartController {
    #[must_use]
    pub fn new(base: usize) -> Self {
        Self { base }
    }

    fn regs(&self) -> &UartRegisters {
        unsafe { &*(self.base as *const UartRegisters) }
    }

    /// Reset the UART and bring it up with the given line settings.
    pub fn init(&mut self, config: &UartConfig, periph_hz: u32) -> Result<(), Error> {
        let cd = baud_divisor(periph_hz, config.baud_rate)?;
        self.regs()
            .cr
            .write(CR::RSTRX::SET + CR::RSTTX::SET + CR::RXDIS::SET + CR::TXDIS::SET);
        let parity = match config.parity {
            Parity::Even => MR::PAR::Even,
            Parity::Odd => MR::PAR::Odd,
            Parity::Space => MR::PAR::Space,
            Parity::Mark => MR::PAR::Mark,
            Parity::None => MR::PAR::None,
        };
        self.regs().mr.write(parity);
        self.regs().brgr.write(BRGR::CD.val(cd));
        self.regs().cr.write(CR::RSTSTA::SET);
        self.regs().cr.write(CR::RXEN::SET + CR::TXEN::SET);
        Ok(())
    }

    #[must_use]
    pub fn is_rx_ready(&self) -> bool {
        self.regs().sr.is_set(SR::RXRDY)
    }

    #[must_use]
    pub fn is_tx_ready(&self) -> bool {
        self.regs().sr.is_set(SR::TXRDY)
    }

    #[must_use]
    pub fn is_tx_empty(&self) -> bool {
        self.regs().sr.is_set(SR::TXEMPTY)
    }

    /// Pull a received byte out of the holding register. Only valid when
    /// [`Self::is_rx_ready`] reports one.
    #[must_use]
    pub fn read_byte(&mut self) -> u8 {
        self.regs().rhr.get() as u8
    }

    /// Blocking single-byte transmit.
    pub fn write_byte(&mut self, byte: u8) {
        while !self.is_tx_ready() {}
        self.regs().thr.set(u32::from(byte));
    }

    pub fn enable_rx_interrupt(&mut self) {
        self.regs().ier.write(SR::RXRDY::SET);
    }

    pub fn disable_rx_interrupt(&mut self) {
        self.regs().idr.write(SR::RXRDY::SET);
    }
}

impl embedded_io::ErrorType for UartController {
    type Error = core::convert::Infallible;
}

impl embedded_io::Read for UartController {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        // Block for the first byte, then drain whatever else is ready.
        let mut count = 0;
        for slot in buf.iter_mut() {
            if count > 0 && !self.is_rx_ready() {
                break;
            }
            while !self.is_rx_ready() {}
            *slot = self.read_byte();
            count += 1;
        }
        Ok(count)
    }
}

impl embedded_io::Write for UartController {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for byte in buf {
            self.write_byte(*byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        while !self.is_tx_empty() {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_for_standard_console_rate() {
        // 83 MHz peripheral clock, 115200 baud
        assert_eq!(baud_divisor(83_000_000, 115_200), Ok(45));
    }

    #[test]
    fn divisor_rejects_out_of_range_rates() {
        // Faster than the peripheral clock can produce
        assert_eq!(
            baud_divisor(1_000_000, 115_200),
            Err(Error::UnreachableBaudRate)
        );
        assert_eq!(baud_divisor(83_000_000, 0), Err(Error::UnreachableBaudRate));
        // Divisor overflows 16 bits
        assert_eq!(
            baud_divisor(2_000_000_000, 1),
            Err(Error::UnreachableBaudRate)
        );
        // 16x oversampling factor overflows u32
        assert_eq!(
            baud_divisor(83_000_000, 300_000_000),
            Err(Error::UnreachableBaudRate)
        );
    }

    #[test]
    fn default_config_is_115200_8n1() {
        let config = UartConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.parity, Parity::None);
    }
}
