// Licensed under the Apache-2.0 license

//! Parallel I/O controller: pin multiplexing and simple GPIO.
//!
//! Configuration is mask-based: MSKR selects a set of lines in one group,
//! and the following CFGR write applies to every selected line.

use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub PioGroupRegisters {
        (0x00 => mskr: ReadWrite<u32>),
        (0x04 => cfgr: ReadWrite<u32, CFGR::Register>),
        (0x08 => pdsr: ReadOnly<u32>),
        (0x0c => locksr: ReadOnly<u32>),
        (0x10 => sodr: WriteOnly<u32>),
        (0x14 => codr: WriteOnly<u32>),
        (0x18 => odsr: ReadWrite<u32>),
        (0x1c => _reserved0),
        (0x20 => ier: WriteOnly<u32>),
        (0x24 => idr: WriteOnly<u32>),
        (0x28 => imr: ReadOnly<u32>),
        (0x2c => isr: ReadOnly<u32>),
        (0x30 => _reserved1),
        (0x40 => @END),
    }
}

register_bitfields![u32,
    CFGR [
        FUNC OFFSET(0) NUMBITS(3) [
            Gpio = 0,
            PeriphA = 1,
            PeriphB = 2,
            PeriphC = 3,
            PeriphD = 4,
            PeriphE = 5,
            PeriphF = 6,
            PeriphG = 7
        ],
        DIR OFFSET(8) NUMBITS(1) [],
        PUEN OFFSET(9) NUMBITS(1) [],
        PDEN OFFSET(10) NUMBITS(1) [],
        OPD OFFSET(14) NUMBITS(1) [],
    ],
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum PioGroup {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PioFunc {
    /// Plain input.
    Input,
    /// Plain output.
    Output,
    /// Peripheral function A through G.
    PeriphA,
    PeriphB,
    PeriphC,
    PeriphD,
    PeriphE,
    PeriphF,
    PeriphG,
}

/// One mux assignment: a set of lines in a group and the function they
/// take.
#[derive(Copy, Clone, Debug)]
pub struct Pin {
    pub group: PioGroup,
    pub mask: u32,
    pub func: PioFunc,
    pub pull_up: bool,
    pub pull_down: bool,
}

impl Pin {
    #[must_use]
    pub const fn peripheral(group: PioGroup, mask: u32, func: PioFunc) -> Self {
        Self {
            group,
            mask,
            func,
            pull_up: false,
            pull_down: false,
        }
    }
}

pub struct Pio {
    base: usize,
}

impl Pio {
    #[must_use]
    pub fn new(base: usize) -> Self {
        Self { base }
    }

    fn group(&self, group: PioGroup) -> &PioGroupRegisters {
        let addr = self.base + (group as usize) * 0x40;
        unsafe { &*(addr as *const PioGroupRegisters) }
    }

    /// Apply one mux assignment.
    pub fn configure(&mut self, pin: &Pin) {
        let regs = self.group(pin.group);
        regs.mskr.set(pin.mask);
        let func = match pin.func {
            PioFunc::Input => CFGR::FUNC::Gpio + CFGR::DIR::CLEAR,
            PioFunc::Output => CFGR::FUNC::Gpio + CFGR::DIR::SET,
            PioFunc::PeriphA => CFGR::FUNC::PeriphA + CFGR::DIR::CLEAR,
            PioFunc::PeriphB => CFGR::FUNC::PeriphB + CFGR::DIR::CLEAR,
            PioFunc::PeriphC => CFGR::FUNC::PeriphC + CFGR::DIR::CLEAR,
            PioFunc::PeriphD => CFGR::FUNC::PeriphD + CFGR::DIR::CLEAR,
            PioFunc::PeriphE => CFGR::FUNC::PeriphE + CFGR::DIR::CLEAR,
            PioFunc::PeriphF => CFGR::FUNC::PeriphF + CFGR::DIR::CLEAR,
            PioFunc::PeriphG => CFGR::FUNC::PeriphG + CFGR::DIR::CLEAR,
        };
        let mut cfgr = func;
        if pin.pull_up {
            cfgr += CFGR::PUEN::SET;
        }
        if pin.pull_down {
            cfgr += CFGR::PDEN::SET;
        }
        regs.cfgr.write(cfgr);
    }

    /// Apply a board pin table.
    pub fn configure_all(&mut self, pins: &[Pin]) {
        for pin in pins {
            self.configure(pin);
        }
    }

    /// Drive selected output lines high.
    pub fn set(&mut self, group: PioGroup, mask: u32) {
        self.group(group).sodr.set(mask);
    }

    /// Drive selected output lines low.
    pub fn clear(&mut self, group: PioGroup, mask: u32) {
        self.group(group).codr.set(mask);
    }

    /// Sampled input state of a group.
    #[must_use]
    pub fn input(&self, group: PioGroup) -> u32 {
        self.group(group).pdsr.get()
    }
}
