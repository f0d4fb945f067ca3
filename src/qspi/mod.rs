// Licensed under the Apache-2.0 license

//! QSPI controller driver, serial-memory mode.
//!
//! Commands are described by [`QspiCommand`] and issued through the
//! instruction registers; data phases go through the AHB memory window.
//! The window can be switched to the AESB alias so that data moving
//! through it is transparently ciphered.

pub mod flash;

use core::sync::atomic::{fence, Ordering};

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub QspiRegisters {
        (0x00 => cr: WriteOnly<u32, CR::Register>),
        (0x04 => mr: ReadWrite<u32, MR::Register>),
        (0x08 => rdr: ReadOnly<u32>),
        (0x0c => tdr: WriteOnly<u32>),
        (0x10 => sr: ReadOnly<u32, SR::Register>),
        (0x14 => ier: WriteOnly<u32, SR::Register>),
        (0x18 => idr: WriteOnly<u32, SR::Register>),
        (0x1c => imr: ReadOnly<u32, SR::Register>),
        (0x20 => scr: ReadWrite<u32, SCR::Register>),
        (0x24 => _reserved0),
        (0x30 => iar: ReadWrite<u32>),
        (0x34 => icr: ReadWrite<u32, ICR::Register>),
        (0x38 => ifr: ReadWrite<u32, IFR::Register>),
        (0x3c => @END),
    }
}

register_bitfields![u32,
    CR [
        QSPIEN OFFSET(0) NUMBITS(1) [],
        QSPIDIS OFFSET(1) NUMBITS(1) [],
        SWRST OFFSET(8) NUMBITS(1) [],
        LASTXFER OFFSET(24) NUMBITS(1) [],
    ],
    MR [
        SMM OFFSET(0) NUMBITS(1) [
            Spi = 0,
            Memory = 1
        ],
        CSMODE OFFSET(4) NUMBITS(2) [],
        NBBITS OFFSET(8) NUMBITS(4) [],
        DLYBCT OFFSET(16) NUMBITS(8) [],
        DLYCS OFFSET(24) NUMBITS(8) [],
    ],
    SR [
        RDRF OFFSET(0) NUMBITS(1) [],
        TDRE OFFSET(1) NUMBITS(1) [],
        TXEMPTY OFFSET(2) NUMBITS(1) [],
        OVRES OFFSET(3) NUMBITS(1) [],
        CSR OFFSET(8) NUMBITS(1) [],
        CSS OFFSET(9) NUMBITS(1) [],
        INSTRE OFFSET(10) NUMBITS(1) [],
        QSPIENS OFFSET(24) NUMBITS(1) [],
    ],
    SCR [
        CPOL OFFSET(0) NUMBITS(1) [],
        CPHA OFFSET(1) NUMBITS(1) [],
        SCBR OFFSET(8) NUMBITS(8) [],
        DLYBS OFFSET(16) NUMBITS(8) [],
    ],
    ICR [
        INST OFFSET(0) NUMBITS(8) [],
        OPT OFFSET(16) NUMBITS(8) [],
    ],
    IFR [
        WIDTH OFFSET(0) NUMBITS(3) [],
        INSTEN OFFSET(4) NUMBITS(1) [],
        ADDREN OFFSET(5) NUMBITS(1) [],
        OPTEN OFFSET(6) NUMBITS(1) [],
        DATAEN OFFSET(7) NUMBITS(1) [],
        OPTL OFFSET(8) NUMBITS(2) [],
        ADDRL OFFSET(10) NUMBITS(1) [
            Bits24 = 0,
            Bits32 = 1
        ],
        TFRTYP OFFSET(12) NUMBITS(2) [
            Read = 0,
            ReadMemory = 1,
            Write = 2,
            WriteMemory = 3
        ],
        NBDUMMY OFFSET(16) NUMBITS(5) [],
    ],
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The serial clock divisor falls outside the 8-bit field.
    UnreachableBitrate,
    /// More dummy cycles than the 5-bit field holds.
    TooManyDummyCycles,
    /// The instruction-end flag never rose.
    Timeout,
}

/// Pad and clocking layout of one command, the `WIDTH` encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum QspiWidth {
    /// Instruction, address, and data all single-bit.
    Single = 0,
    /// Data on two pads.
    DualOutput = 1,
    /// Data on four pads.
    QuadOutput = 2,
    /// Address and data on two pads.
    DualIo = 3,
    /// Address and data on four pads.
    QuadIo = 4,
}

/// One serial-memory-mode command.
#[derive(Copy, Clone, Debug)]
pub struct QspiCommand {
    pub instruction: u8,
    pub address: Option<u32>,
    pub option: Option<u8>,
    pub dummy_cycles: u8,
    pub width: QspiWidth,
}

impl QspiCommand {
    #[must_use]
    pub fn simple(instruction: u8) -> Self {
        Self {
            instruction,
            address: None,
            option: None,
            dummy_cycles: 0,
            width: QspiWidth::Single,
        }
    }

    #[must_use]
    pub fn with_address(instruction: u8, address: u32) -> Self {
        Self {
            address: Some(address),
            ..Self::simple(instruction)
        }
    }
}

/// Serial clock divisor and the actually achieved rate. The divisor is
/// rounded up so the target is never exceeded.
pub fn baud_divisor(periph_hz: u32, target_hz: u32) -> Result<(u32, u32), Error> {
    if target_hz == 0 {
        return Err(Error::UnreachableBitrate);
    }
    let scbr = periph_hz.div_ceil(target_hz).saturating_sub(1);
    if scbr > 255 {
        return Err(Error::UnreachableBitrate);
    }
    Ok((scbr, periph_hz / (scbr + 1)))
}

const POLL_LIMIT: u32 = 1_000_000;

pub struct QspiController {
    base: usize,
    mem_base: usize,
    aesb_mem_base: usize,
    through_aesb: bool,
}

impl QspiController {
    #[must_use]
    pub fn new(base: usize, mem_base: usize, aesb_mem_base: usize) -> Self {
        Self {
            base,
            mem_base,
            aesb_mem_base,
            through_aesb: false,
        }
    }

    fn regs(&self) -> &QspiRegisters {
        unsafe { &*(self.base as *const QspiRegisters) }
    }

    fn mem(&self) -> usize {
        if self.through_aesb {
            self.aesb_mem_base
        } else {
            self.mem_base
        }
    }

    /// Route data phases through the AESB alias window (ciphered) or the
    /// plain window.
    pub fn use_aesb(&mut self, enabled: bool) {
        self.through_aesb = enabled;
    }

    #[must_use]
    pub fn is_using_aesb(&self) -> bool {
        self.through_aesb
    }

    /// Reset the controller and enable it in serial-memory mode.
    pub fn init(&mut self) {
        self.regs().cr.write(CR::QSPIDIS::SET);
        self.regs().cr.write(CR::SWRST::SET);
        self.regs().mr.write(MR::SMM::Memory);
        self.regs().cr.write(CR::QSPIEN::SET);
    }

    pub fn disable(&mut self) {
        self.regs().cr.write(CR::QSPIDIS::SET);
    }

    /// Program the serial clock, returning the achieved rate in Hz.
    pub fn set_baudrate(&mut self, periph_hz: u32, target_hz: u32) -> Result<u32, Error> {
        let (scbr, achieved) = baud_divisor(periph_hz, target_hz)?;
        self.regs().scr.write(SCR::SCBR.val(scbr));
        Ok(achieved)
    }

    fn wait_instruction_end(&self) -> Result<(), Error> {
        for _ in 0..POLL_LIMIT {
            if self.regs().sr.is_set(SR::INSTRE) {
                return Ok(());
            }
        }
        Err(Error::Timeout)
    }

    fn start_command(
        &self,
        cmd: &QspiCommand,
        tfrtyp: tock_registers::fields::FieldValue<u32, IFR::Register>,
        data: bool,
    ) -> Result<(), Error> {
        if cmd.dummy_cycles > 31 {
            return Err(Error::TooManyDummyCycles);
        }
        let mut ifr = IFR::WIDTH.val(cmd.width as u32)
            + IFR::INSTEN::SET
            + IFR::NBDUMMY.val(u32::from(cmd.dummy_cycles))
            + tfrtyp;
        let mut icr = ICR::INST.val(u32::from(cmd.instruction));
        if let Some(address) = cmd.address {
            self.regs().iar.set(address);
            ifr += IFR::ADDREN::SET;
        }
        if let Some(option) = cmd.option {
            icr += ICR::OPT.val(u32::from(option));
            ifr += IFR::OPTEN::SET;
        }
        if data {
            ifr += IFR::DATAEN::SET;
        }
        self.regs().icr.write(icr);
        self.regs().ifr.write(ifr);
        // Synchronizing read before any system bus access
        let _ = self.regs().ifr.get();
        Ok(())
    }

    /// Issue a command with no data phase.
    pub fn send_command(&mut self, cmd: &QspiCommand) -> Result<(), Error> {
        self.start_command(cmd, IFR::TFRTYP::Read, false)?;
        self.wait_instruction_end()
    }

    /// Issue a command and read its data phase through the memory window.
    /// `memory` selects the fetch-style transfer type used for array reads.
    pub fn read_data(
        &mut self,
        cmd: &QspiCommand,
        buffer: &mut [u8],
        memory: bool,
    ) -> Result<(), Error> {
        let tfrtyp = if memory {
            IFR::TFRTYP::ReadMemory
        } else {
            IFR::TFRTYP::Read
        };
        self.start_command(cmd, tfrtyp, true)?;
        let offset = if memory {
            cmd.address.unwrap_or(0) as usize
        } else {
            0
        };
        let window = self.mem() + offset;
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = unsafe { core::ptr::read_volatile((window + i) as *const u8) };
        }
        fence(Ordering::SeqCst);
        self.regs().cr.write(CR::LASTXFER::SET);
        self.wait_instruction_end()
    }

    /// Issue a command and feed its data phase through the memory window.
    pub fn write_data(&mut self, cmd: &QspiCommand, data: &[u8]) -> Result<(), Error> {
        self.start_command(cmd, IFR::TFRTYP::WriteMemory, true)?;
        let offset = cmd.address.unwrap_or(0) as usize;
        let window = self.mem() + offset;
        for (i, byte) in data.iter().enumerate() {
            unsafe { core::ptr::write_volatile((window + i) as *mut u8, *byte) };
        }
        fence(Ordering::SeqCst);
        self.regs().cr.write(CR::LASTXFER::SET);
        self.wait_instruction_end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baud_divisor_never_exceeds_target() {
        // 166 MHz down to 66 MHz needs /3, SCBR 2
        assert_eq!(baud_divisor(166_000_000, 66_000_000), Ok((2, 55_333_333)));
        assert_eq!(baud_divisor(166_000_000, 166_000_000), Ok((0, 166_000_000)));
    }

    #[test]
    fn baud_divisor_out_of_range() {
        assert_eq!(baud_divisor(166_000_000, 0), Err(Error::UnreachableBitrate));
        assert_eq!(
            baud_divisor(166_000_000, 500_000),
            Err(Error::UnreachableBitrate)
        );
    }

    #[test]
    fn command_constructors() {
        let cmd = QspiCommand::simple(0x9f);
        assert_eq!(cmd.instruction, 0x9f);
        assert!(cmd.address.is_none());
        assert_eq!(cmd.width, QspiWidth::Single);

        let cmd = QspiCommand::with_address(0x20, 0x1000);
        assert_eq!(cmd.address, Some(0x1000));
    }
}
