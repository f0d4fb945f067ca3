// Licensed under the Apache-2.0 license

//! Power management controller driver.
//!
//! Owns the clock tree: oscillator selection, PLLA setup, master clock
//! source/prescaler/divider switching, peripheral clock gating through the
//! one-register PCR command protocol, and the programmable clock outputs.
//! The arithmetic lives in [`clocktree`]; this module binds it to the
//! registers and the documented ready-bit polling protocol.

pub mod clocktree;

pub use clocktree::{
    BoardClocks, MasterClockSource, MckDivider, Prescaler, MAIN_CLOCK_INT_OSC, SLOW_CLOCK_INT_OSC,
};

use fugit::HertzU32;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

use crate::chip;

register_structs! {
    pub PmcRegisters {
        (0x000 => scer: WriteOnly<u32, SC::Register>),
        (0x004 => scdr: WriteOnly<u32, SC::Register>),
        (0x008 => scsr: ReadOnly<u32, SC::Register>),
        (0x00c => _reserved0),
        (0x010 => pcer0: WriteOnly<u32>),
        (0x014 => pcdr0: WriteOnly<u32>),
        (0x018 => pcsr0: ReadOnly<u32>),
        (0x01c => ckgr_uckr: ReadWrite<u32>),
        (0x020 => ckgr_mor: ReadWrite<u32, MOR::Register>),
        (0x024 => ckgr_mcfr: ReadOnly<u32, MCFR::Register>),
        (0x028 => ckgr_pllar: ReadWrite<u32, PLLAR::Register>),
        (0x02c => _reserved1),
        (0x030 => mckr: ReadWrite<u32, MCKR::Register>),
        (0x034 => _reserved2),
        (0x040 => pck0: ReadWrite<u32, PCK::Register>),
        (0x044 => pck1: ReadWrite<u32, PCK::Register>),
        (0x048 => pck2: ReadWrite<u32, PCK::Register>),
        (0x04c => _reserved3),
        (0x060 => ier: WriteOnly<u32, SR::Register>),
        (0x064 => idr: WriteOnly<u32, SR::Register>),
        (0x068 => sr: ReadOnly<u32, SR::Register>),
        (0x06c => imr: ReadOnly<u32, SR::Register>),
        (0x070 => _reserved4),
        (0x080 => pllicpr: ReadWrite<u32>),
        (0x084 => _reserved5),
        (0x0e4 => wpmr: ReadWrite<u32>),
        (0x0e8 => wpsr: ReadOnly<u32>),
        (0x0ec => _reserved6),
        (0x100 => pcer1: WriteOnly<u32>),
        (0x104 => pcdr1: WriteOnly<u32>),
        (0x108 => pcsr1: ReadOnly<u32>),
        (0x10c => pcr: ReadWrite<u32, PCR::Register>),
        (0x110 => @END),
    },
    pub SckcRegisters {
        (0x0 => cr: ReadWrite<u32, SCKC_CR::Register>),
        (0x4 => @END),
    }
}

register_bitfields![u32,
    SC [
        DDRCK OFFSET(2) NUMBITS(1) [],
        PCK0 OFFSET(8) NUMBITS(1) [],
        PCK1 OFFSET(9) NUMBITS(1) [],
        PCK2 OFFSET(10) NUMBITS(1) [],
    ],
    MOR [
        MOSCXTEN OFFSET(0) NUMBITS(1) [],
        MOSCXTBY OFFSET(1) NUMBITS(1) [],
        MOSCRCEN OFFSET(3) NUMBITS(1) [],
        MOSCXTST OFFSET(8) NUMBITS(8) [],
        KEY OFFSET(16) NUMBITS(8) [
            Passwd = 0x37
        ],
        MOSCSEL OFFSET(24) NUMBITS(1) [],
        CFDEN OFFSET(25) NUMBITS(1) [],
    ],
    MCFR [
        MAINF OFFSET(0) NUMBITS(16) [],
        MAINFRDY OFFSET(16) NUMBITS(1) [],
    ],
    PLLAR [
        DIVA OFFSET(0) NUMBITS(8) [],
        PLLACOUNT OFFSET(8) NUMBITS(6) [],
        OUTA OFFSET(14) NUMBITS(2) [],
        MULA OFFSET(18) NUMBITS(7) [],
        ONE OFFSET(29) NUMBITS(1) [],
    ],
    MCKR [
        CSS OFFSET(0) NUMBITS(2) [
            SlowClock = 0,
            MainClock = 1,
            PllaClock = 2,
            UpllClock = 3
        ],
        PRES OFFSET(4) NUMBITS(3) [],
        MDIV OFFSET(8) NUMBITS(2) [],
        PLLADIV2 OFFSET(12) NUMBITS(1) [],
        H32MXDIV OFFSET(24) NUMBITS(1) [],
    ],
    PCK [
        CSS OFFSET(0) NUMBITS(3) [],
        PRES OFFSET(4) NUMBITS(8) [],
    ],
    SR [
        MOSCXTS OFFSET(0) NUMBITS(1) [],
        LOCKA OFFSET(1) NUMBITS(1) [],
        MCKRDY OFFSET(3) NUMBITS(1) [],
        LOCKU OFFSET(6) NUMBITS(1) [],
        PCKRDY0 OFFSET(8) NUMBITS(1) [],
        PCKRDY1 OFFSET(9) NUMBITS(1) [],
        PCKRDY2 OFFSET(10) NUMBITS(1) [],
        MOSCSELS OFFSET(16) NUMBITS(1) [],
        MOSCRCS OFFSET(17) NUMBITS(1) [],
    ],
    PCR [
        PID OFFSET(0) NUMBITS(7) [],
        CMD OFFSET(12) NUMBITS(1) [],
        EN OFFSET(28) NUMBITS(1) [],
    ],
    SCKC_CR [
        RCEN OFFSET(0) NUMBITS(1) [],
        OSC32EN OFFSET(1) NUMBITS(1) [],
        OSC32BYP OFFSET(2) NUMBITS(1) [],
        OSCSEL OFFSET(3) NUMBITS(1) [
            Rc = 0,
            Xtal = 1
        ],
    ],
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Peripheral ID outside the gateable range.
    InvalidPeripheral(u32),
    /// PLLA multiplier or divider out of field range.
    InvalidPllConfig,
}

/// PLLA settings. Output is `input * (mula + 1) / diva`, optionally halved
/// by the MCKR post-divider.
#[derive(Clone, Copy, Debug)]
pub struct PllaConfig {
    pub mula: u8,
    pub diva: u8,
    /// Slow-clock cycles before the lock bit is polled valid.
    pub count: u8,
    /// Charge pump current setting for PMC_PLLICPR.
    pub icp: u32,
}

/// Programmable clock outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PckId {
    Pck0,
    Pck1,
    Pck2,
}

/// Source selection for a programmable clock output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum PckSource {
    SlowClock = 0,
    MainClock = 1,
    PllaClock = 2,
    UpllClock = 3,
    MasterClock = 4,
}

pub struct Pmc {
    base: usize,
    sckc_base: usize,
    board: BoardClocks,
    // Computed lazily, dropped whenever MCKR changes.
    cached_mck: Option<u32>,
}

impl Pmc {
    #[must_use]
    pub fn new(board: BoardClocks) -> Self {
        Self {
            base: chip::PMC_BASE,
            sckc_base: chip::SCKC_BASE,
            board,
            cached_mck: None,
        }
    }

    fn regs(&self) -> &PmcRegisters {
        unsafe { &*(self.base as *const PmcRegisters) }
    }

    fn sckc(&self) -> &SckcRegisters {
        unsafe { &*(self.sckc_base as *const SckcRegisters) }
    }

    fn wait_mck_ready(&self) {
        while !self.regs().sr.is_set(SR::MCKRDY) {}
    }

    /// Slow clock frequency: 32.768 kHz crystal or the on-chip 32 kHz RC,
    /// per `SCKC_CR.OSCSEL`.
    #[must_use]
    pub fn slow_clock(&self) -> HertzU32 {
        let hz = if self.sckc().cr.matches_all(SCKC_CR::OSCSEL::Xtal) {
            self.board.slow_xtal
        } else {
            SLOW_CLOCK_INT_OSC
        };
        HertzU32::from_raw(hz)
    }

    /// Main clock frequency: board crystal or the on-chip 12 MHz RC, per
    /// `CKGR_MOR.MOSCSEL`.
    #[must_use]
    pub fn main_clock(&self) -> HertzU32 {
        let hz = if self.regs().ckgr_mor.is_set(MOR::MOSCSEL) {
            self.board.main_xtal
        } else {
            MAIN_CLOCK_INT_OSC
        };
        HertzU32::from_raw(hz)
    }

    /// PLLA output frequency. Zero when the PLL is off (DIVA == 0).
    #[must_use]
    pub fn plla_clock(&self) -> HertzU32 {
        let pllar = self.regs().ckgr_pllar.extract();
        let div2 = self.regs().mckr.is_set(MCKR::PLLADIV2);
        HertzU32::from_raw(clocktree::plla_output(
            self.main_clock().raw(),
            pllar.read(PLLAR::MULA),
            pllar.read(PLLAR::DIVA),
            div2,
        ))
    }

    fn compute_mck(&self) -> u32 {
        let mckr = self.regs().mckr.extract();
        let source = match MasterClockSource::from_field(mckr.read(MCKR::CSS)) {
            MasterClockSource::SlowClock => self.slow_clock().raw(),
            MasterClockSource::MainClock => self.main_clock().raw(),
            MasterClockSource::PllaClock => self.plla_clock().raw(),
            // UPLL frequency is fixed by the USB crystal requirements
            MasterClockSource::UpllClock => self.board.main_xtal,
        };
        clocktree::master_clock(
            source,
            Prescaler::from_field(mckr.read(MCKR::PRES)),
            MckDivider::from_field(mckr.read(MCKR::MDIV)),
        )
    }

    /// Master clock frequency, cached until the next MCKR update.
    pub fn master_clock(&mut self) -> HertzU32 {
        let hz = match self.cached_mck {
            Some(hz) => hz,
            None => {
                let hz = self.compute_mck();
                self.cached_mck = Some(hz);
                hz
            }
        };
        HertzU32::from_raw(hz)
    }

    /// Processor clock frequency: MCK multiplied back up by the master
    /// divider.
    pub fn processor_clock(&mut self) -> HertzU32 {
        let mdiv = MckDivider::from_field(self.regs().mckr.read(MCKR::MDIV));
        HertzU32::from_raw(clocktree::processor_clock(self.master_clock().raw(), mdiv))
    }

    /// Clock seen by a peripheral: MCK divided by its matrix divider.
    pub fn peripheral_clock(&mut self, id: u32) -> Result<HertzU32, Error> {
        let h32mx_div2 = self.regs().mckr.is_set(MCKR::H32MXDIV);
        let div = chip::peripheral_clock_divider(id, h32mx_div2)
            .ok_or(Error::InvalidPeripheral(id))?;
        Ok(HertzU32::from_raw(self.master_clock().raw() / div))
    }

    fn check_pid(id: u32) -> Result<(), Error> {
        if id > 1 && id < chip::ID_PERIPH_COUNT {
            Ok(())
        } else {
            Err(Error::InvalidPeripheral(id))
        }
    }

    /// Gate a peripheral clock on through the PCR command protocol.
    pub fn enable_peripheral(&mut self, id: u32) -> Result<(), Error> {
        Self::check_pid(id)?;
        self.regs().pcr.write(PCR::PID.val(id));
        // modify() performs the required read-back before the command write
        self.regs().pcr.modify(PCR::CMD::SET + PCR::EN::SET);
        Ok(())
    }

    pub fn disable_peripheral(&mut self, id: u32) -> Result<(), Error> {
        Self::check_pid(id)?;
        self.regs().pcr.write(PCR::PID.val(id));
        self.regs().pcr.modify(PCR::CMD::SET + PCR::EN::CLEAR);
        Ok(())
    }

    pub fn is_peripheral_enabled(&mut self, id: u32) -> Result<bool, Error> {
        Self::check_pid(id)?;
        self.regs().pcr.write(PCR::PID.val(id));
        Ok(self.regs().pcr.is_set(PCR::EN))
    }

    pub fn disable_all_peripherals(&mut self) {
        for id in 2..chip::ID_PERIPH_COUNT {
            let _ = self.disable_peripheral(id);
        }
    }

    /// Switch the main clock to the external oscillator, waiting for
    /// stabilization at each step.
    pub fn select_external_osc(&mut self) {
        if self.regs().ckgr_mor.is_set(MOR::MOSCSEL) {
            return;
        }
        self.regs()
            .ckgr_mor
            .modify(MOR::KEY::Passwd + MOR::MOSCXTEN::SET);
        while !self.regs().ckgr_mcfr.is_set(MCFR::MAINFRDY) {}
        self.regs()
            .ckgr_mor
            .modify(MOR::KEY::Passwd + MOR::MOSCSEL::SET);
        while !self.regs().sr.is_set(SR::MOSCSELS) {}
        // MCK may be running on MAIN_CLK
        self.wait_mck_ready();
        self.cached_mck = None;
    }

    /// Switch the main clock back to the internal 12 MHz RC and disable the
    /// crystal oscillator.
    pub fn select_internal_osc(&mut self) {
        while !self.regs().sr.is_set(SR::MOSCRCS) {}
        self.regs()
            .ckgr_mor
            .modify(MOR::KEY::Passwd + MOR::MOSCSEL::CLEAR);
        self.wait_mck_ready();
        self.regs()
            .ckgr_mor
            .modify(MOR::KEY::Passwd + MOR::MOSCXTEN::CLEAR);
        self.wait_mck_ready();
        self.cached_mck = None;
    }

    fn settle_slow_clock(&self) {
        // At least 5 slow-clock cycles for internal resynchronization
        for _ in 0..0x1000 {
            core::hint::spin_loop();
        }
    }

    /// Switch the slow clock to the external 32.768 kHz crystal.
    pub fn select_external_crystal(&mut self) {
        let on_slck =
            self.regs().mckr.read(MCKR::CSS) == MasterClockSource::SlowClock as u32;
        if on_slck {
            self.switch_mck_to_main();
        }
        self.sckc().cr.modify(SCKC_CR::OSCSEL::Xtal);
        self.settle_slow_clock();
        if on_slck {
            self.switch_mck_to_slck();
        }
        self.cached_mck = None;
    }

    /// Switch the slow clock to the internal 32 kHz RC.
    pub fn select_internal_crystal(&mut self) {
        let on_slck =
            self.regs().mckr.read(MCKR::CSS) == MasterClockSource::SlowClock as u32;
        if on_slck {
            self.switch_mck_to_main();
        }
        self.sckc().cr.modify(SCKC_CR::OSCSEL::Rc);
        self.settle_slow_clock();
        if on_slck {
            self.switch_mck_to_slck();
        }
        self.cached_mck = None;
    }

    pub fn switch_mck_to_pll(&mut self) {
        self.regs().mckr.modify(MCKR::CSS::PllaClock);
        self.wait_mck_ready();
        self.cached_mck = None;
    }

    pub fn switch_mck_to_main(&mut self) {
        self.regs().mckr.modify(MCKR::CSS::MainClock);
        self.wait_mck_ready();
        self.cached_mck = None;
    }

    pub fn switch_mck_to_slck(&mut self) {
        self.regs().mckr.modify(MCKR::CSS::SlowClock);
        self.wait_mck_ready();
        self.cached_mck = None;
    }

    /// Program the MCK prescaler. One MCKR field per write, with an MCKRDY
    /// poll in between, as the clock generator requires.
    pub fn set_mck_prescaler(&mut self, pres: Prescaler) {
        self.regs().mckr.modify(MCKR::PRES.val(pres as u32));
        self.wait_mck_ready();
        self.cached_mck = None;
    }

    pub fn set_mck_divider(&mut self, mdiv: MckDivider) {
        self.regs().mckr.modify(MCKR::MDIV.val(mdiv as u32));
        self.wait_mck_ready();
        self.cached_mck = None;
    }

    pub fn set_mck_plla_div2(&mut self, div2: bool) {
        if self.regs().mckr.is_set(MCKR::PLLADIV2) == div2 {
            return;
        }
        if div2 {
            self.regs().mckr.modify(MCKR::PLLADIV2::SET);
        } else {
            self.regs().mckr.modify(MCKR::PLLADIV2::CLEAR);
        }
        self.wait_mck_ready();
        self.cached_mck = None;
    }

    /// Program PLLA and wait for lock.
    pub fn set_plla(&mut self, config: PllaConfig) -> Result<(), Error> {
        if config.mula > 127 || config.count > 63 {
            return Err(Error::InvalidPllConfig);
        }
        self.regs().ckgr_pllar.write(
            PLLAR::ONE::SET
                + PLLAR::MULA.val(u32::from(config.mula))
                + PLLAR::DIVA.val(u32::from(config.diva))
                + PLLAR::PLLACOUNT.val(u32::from(config.count)),
        );
        self.regs().pllicpr.set(config.icp);
        while !self.regs().sr.is_set(SR::LOCKA) {}
        self.cached_mck = None;
        Ok(())
    }

    /// Turn PLLA off by clearing the multiplier.
    pub fn disable_plla(&mut self) {
        self.regs().ckgr_pllar.modify(PLLAR::MULA.val(0));
        self.cached_mck = None;
    }

    fn pck_reg(&self, id: PckId) -> &ReadWrite<u32, PCK::Register> {
        match id {
            PckId::Pck0 => &self.regs().pck0,
            PckId::Pck1 => &self.regs().pck1,
            PckId::Pck2 => &self.regs().pck2,
        }
    }

    /// Configure a programmable clock output. The output is left disabled.
    pub fn configure_pck(&mut self, id: PckId, source: PckSource, prescaler: u8) {
        self.disable_pck(id);
        self.pck_reg(id)
            .write(PCK::CSS.val(source as u32) + PCK::PRES.val(u32::from(prescaler)));
    }

    pub fn enable_pck(&mut self, id: PckId) {
        let (scer, rdy) = match id {
            PckId::Pck0 => (SC::PCK0::SET, SR::PCKRDY0),
            PckId::Pck1 => (SC::PCK1::SET, SR::PCKRDY1),
            PckId::Pck2 => (SC::PCK2::SET, SR::PCKRDY2),
        };
        self.regs().scer.write(scer);
        while !self.regs().sr.is_set(rdy) {}
    }

    pub fn disable_pck(&mut self, id: PckId) {
        let (scdr, scsr) = match id {
            PckId::Pck0 => (SC::PCK0::SET, SC::PCK0),
            PckId::Pck1 => (SC::PCK1::SET, SC::PCK1),
            PckId::Pck2 => (SC::PCK2::SET, SC::PCK2),
        };
        self.regs().scdr.write(scdr);
        while self.regs().scsr.is_set(scsr) {}
    }

    /// Frequency of a programmable clock output.
    pub fn pck_clock(&mut self, id: PckId) -> HertzU32 {
        let pck = self.pck_reg(id).extract();
        let source = match pck.read(PCK::CSS) {
            0 => self.slow_clock().raw(),
            1 => self.main_clock().raw(),
            2 => self.plla_clock().raw(),
            4 => self.master_clock().raw(),
            // UPLL / audio PLL measurement is not supported
            _ => 0,
        };
        HertzU32::from_raw(clocktree::pck_output(source, pck.read(PCK::PRES)))
    }

    pub fn enable_ddr_clock(&mut self) {
        self.regs().scer.write(SC::DDRCK::SET);
        while !self.regs().scsr.is_set(SC::DDRCK) {}
    }

    pub fn disable_ddr_clock(&mut self) {
        self.regs().scdr.write(SC::DDRCK::SET);
        while self.regs().scsr.is_set(SC::DDRCK) {}
    }
}
