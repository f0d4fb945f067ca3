// Licensed under the Apache-2.0 license

//! SPI master driver.
//!
//! The controller is exposed as an [`embedded_hal::spi::SpiDevice`]: the
//! chip select stays asserted across one `transaction` and is released by
//! the controller's last-transfer command, which is what the serial flash
//! command/data sequences need.

pub mod at25;

use embedded_hal::spi::{Mode, Operation, Phase, Polarity, MODE_0};
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub SpiRegisters {
        (0x00 => cr: WriteOnly<u32, CR::Register>),
        (0x04 => mr: ReadWrite<u32, MR::Register>),
        (0x08 => rdr: ReadOnly<u32>),
        (0x0c => tdr: WriteOnly<u32>),
        (0x10 => sr: ReadOnly<u32, SR::Register>),
        (0x14 => ier: WriteOnly<u32, SR::Register>),
        (0x18 => idr: WriteOnly<u32, SR::Register>),
        (0x1c => imr: ReadOnly<u32, SR::Register>),
        (0x20 => _reserved0),
        (0x30 => csr0: ReadWrite<u32, CSR::Register>),
        (0x34 => csr1: ReadWrite<u32, CSR::Register>),
        (0x38 => csr2: ReadWrite<u32, CSR::Register>),
        (0x3c => csr3: ReadWrite<u32, CSR::Register>),
        (0x40 => @END),
    }
}

register_bitfields![u32,
    CR [
        SPIEN OFFSET(0) NUMBITS(1) [],
        SPIDIS OFFSET(1) NUMBITS(1) [],
        SWRST OFFSET(7) NUMBITS(1) [],
        LASTXFER OFFSET(24) NUMBITS(1) [],
    ],
    MR [
        MSTR OFFSET(0) NUMBITS(1) [],
        PS OFFSET(1) NUMBITS(1) [],
        MODFDIS OFFSET(4) NUMBITS(1) [],
        WDRBT OFFSET(5) NUMBITS(1) [],
        PCS OFFSET(16) NUMBITS(4) [],
        DLYBCS OFFSET(24) NUMBITS(8) [],
    ],
    SR [
        RDRF OFFSET(0) NUMBITS(1) [],
        TDRE OFFSET(1) NUMBITS(1) [],
        MODF OFFSET(2) NUMBITS(1) [],
        OVRES OFFSET(3) NUMBITS(1) [],
        TXEMPTY OFFSET(9) NUMBITS(1) [],
        SPIENS OFFSET(16) NUMBITS(1) [],
    ],
    CSR [
        CPOL OFFSET(0) NUMBITS(1) [],
        NCPHA OFFSET(1) NUMBITS(1) [],
        CSAAT OFFSET(3) NUMBITS(1) [],
        BITS OFFSET(4) NUMBITS(4) [],
        SCBR OFFSET(8) NUMBITS(8) [],
        DLYBS OFFSET(16) NUMBITS(8) [],
        DLYBCT OFFSET(24) NUMBITS(8) [],
    ],
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The bitrate divisor falls outside the 8-bit SCBR field.
    UnreachableBitrate,
    /// Chip select beyond the controller's four lines.
    InvalidChipSelect,
    /// A status poll gave up.
    Timeout,
}

impl embedded_hal::spi::Error for Error {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}

/// Serial clock divisor for a target bitrate. SCBR 0 is reserved.
pub fn serial_baud_divisor(periph_hz: u32, bitrate_hz: u32) -> Result<u32, Error> {
    if bitrate_hz == 0 || bitrate_hz > periph_hz {
        return Err(Error::UnreachableBitrate);
    }
    let scbr = periph_hz.div_ceil(bitrate_hz);
    if scbr == 0 || scbr > 255 {
        return Err(Error::UnreachableBitrate);
    }
    Ok(scbr)
}

#[derive(Copy, Clone, Debug)]
pub struct SpiConfig {
    pub chip_select: u8,
    pub mode: Mode,
    pub bitrate_hz: u32,
    /// Delay before SPCK after chip select assertion, in peripheral clock
    /// periods.
    pub dlybs: u8,
    /// Delay between consecutive transfers, in units of 32 peripheral clock
    /// periods.
    pub dlybct: u8,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            chip_select: 0,
            mode: MODE_0,
            bitrate_hz: 1_000_000,
            dlybs: 0,
            dlybct: 0,
        }
    }
}

const POLL_LIMIT: u32 = 1_000_000;

pub struct SpiController {
    base: usize,
    chip_select: u8,
}

impl SpiController {
    #[must_use]
    pub fn new(base: usize) -> Self {
        Self {
            base,
            chip_select: 0,
        }
    }

    fn regs(&self) -> &SpiRegisters {
        unsafe { &*(self.base as *const SpiRegisters) }
    }

    /// Reset the controller and configure it as a master on one fixed chip
    /// select.
    pub fn configure(&mut self, config: &SpiConfig, periph_hz: u32) -> Result<(), Error> {
        if config.chip_select > 3 {
            return Err(Error::InvalidChipSelect);
        }
        let scbr = serial_baud_divisor(periph_hz, config.bitrate_hz)?;
        self.chip_select = config.chip_select;

        self.regs().cr.write(CR::SPIDIS::SET);
        self.regs().cr.write(CR::SWRST::SET);
        self.regs().cr.write(CR::SWRST::SET);

        // Fixed peripheral select: PCS is the one-cold encoding of the line
        let pcs = !(1u32 << config.chip_select) & 0xf;
        self.regs()
            .mr
            .write(MR::MSTR::SET + MR::MODFDIS::SET + MR::PCS.val(pcs));

        let cpol = match config.mode.polarity {
            Polarity::IdleLow => CSR::CPOL::CLEAR,
            Polarity::IdleHigh => CSR::CPOL::SET,
        };
        // NCPHA is the inverse of the usual CPHA convention
        let ncpha = match config.mode.phase {
            Phase::CaptureOnFirstTransition => CSR::NCPHA::SET,
            Phase::CaptureOnSecondTransition => CSR::NCPHA::CLEAR,
        };
        let csr = cpol
            + ncpha
            + CSR::CSAAT::SET
            + CSR::BITS.val(0)
            + CSR::SCBR.val(scbr)
            + CSR::DLYBS.val(u32::from(config.dlybs))
            + CSR::DLYBCT.val(u32::from(config.dlybct));
        match config.chip_select {
            0 => self.regs().csr0.write(csr),
            1 => self.regs().csr1.write(csr),
            2 => self.regs().csr2.write(csr),
            _ => self.regs().csr3.write(csr),
        }

        self.regs().cr.write(CR::SPIEN::SET);
        Ok(())
    }

    fn wait_sr(&self, field: tock_registers::fields::Field<u32, SR::Register>) -> Result<(), Error> {
        for _ in 0..POLL_LIMIT {
            if self.regs().sr.is_set(field) {
                return Ok(());
            }
        }
        Err(Error::Timeout)
    }

    /// Clock one byte out and return the byte clocked in.
    pub fn transfer_byte(&mut self, byte: u8) -> Result<u8, Error> {
        self.wait_sr(SR::TDRE)?;
        self.regs().tdr.set(u32::from(byte));
        self.wait_sr(SR::RDRF)?;
        Ok(self.regs().rdr.get() as u8)
    }

    fn run_operation(&mut self, op: &mut Operation<'_, u8>) -> Result<(), Error> {
        use embedded_hal::spi::SpiBus;
        match op {
            Operation::Read(buf) => SpiBus::read(self, buf),
            Operation::Write(buf) => SpiBus::write(self, buf),
            Operation::Transfer(read, write) => SpiBus::transfer(self, read, write),
            Operation::TransferInPlace(buf) => SpiBus::transfer_in_place(self, buf),
            Operation::DelayNs(ns) => {
                for _ in 0..*ns {
                    core::hint::spin_loop();
                }
                Ok(())
            }
        }
    }

    fn end_transaction(&mut self) -> Result<(), Error> {
        self.regs().cr.write(CR::LASTXFER::SET);
        self.wait_sr(SR::TXEMPTY)
    }
}

impl embedded_hal::spi::ErrorType for SpiController {
    type Error = Error;
}

/// Raw bus access. The hardware keeps the chip select asserted (CSAAT)
/// until [`SpiDevice`] ends a transaction, so bus-level users must issue
/// their own last-transfer command if they bypass transactions.
impl embedded_hal::spi::SpiBus<u8> for SpiController {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Error> {
        for slot in words.iter_mut() {
            *slot = self.transfer_byte(0)?;
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Error> {
        for byte in words {
            let _ = self.transfer_byte(*byte)?;
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Error> {
        let len = read.len().max(write.len());
        for i in 0..len {
            let tx = write.get(i).copied().unwrap_or(0);
            let rx = self.transfer_byte(tx)?;
            if let Some(slot) = read.get_mut(i) {
                *slot = rx;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Error> {
        for slot in words.iter_mut() {
            *slot = self.transfer_byte(*slot)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.wait_sr(SR::TXEMPTY)
    }
}

/// One transaction per flash command: chip select held across the
/// operations, released by the last-transfer command.
impl embedded_hal::spi::SpiDevice<u8> for SpiController {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Error> {
        for op in operations.iter_mut() {
            self.run_operation(op)?;
        }
        self.end_transaction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_rounds_up_so_rate_is_never_exceeded() {
        // 83 MHz / 10 MHz needs a divisor of 9, not 8
        assert_eq!(serial_baud_divisor(83_000_000, 10_000_000), Ok(9));
        assert_eq!(serial_baud_divisor(83_000_000, 83_000_000), Ok(1));
    }

    #[test]
    fn divisor_out_of_field_range_is_an_error() {
        assert_eq!(
            serial_baud_divisor(83_000_000, 100_000),
            Err(Error::UnreachableBitrate)
        );
        assert_eq!(serial_baud_divisor(83_000_000, 0), Err(Error::UnreachableBitrate));
    }

    #[test]
    fn bitrate_above_peripheral_clock_is_an_error() {
        // SCBR cannot divide below 1, so this must not clamp
        assert_eq!(
            serial_baud_divisor(83_000_000, 100_000_000),
            Err(Error::UnreachableBitrate)
        );
    }

    #[test]
    fn default_config_uses_mode_0_on_cs0() {
        let config = SpiConfig::default();
        assert_eq!(config.chip_select, 0);
        assert_eq!(config.mode, MODE_0);
    }
}
