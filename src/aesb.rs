// Licensed under the Apache-2.0 license

//! Advanced encryption standard bridge (AESB) driver.
//!
//! The bridge sits between the system bus and its alias window and ciphers
//! data on the fly, so "driving" it is configuration only: pick the
//! operating mode and let automatic key generation and auto-start do the
//! rest. Peers that must see plaintext simply bypass the alias window.

use tock_registers::interfaces::Writeable;
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

register_structs! {
    pub AesbRegisters {
        (0x00 => cr: WriteOnly<u32, CR::Register>),
        (0x04 => mr: ReadWrite<u32, MR::Register>),
        (0x08 => _reserved0),
        (0x10 => ier: WriteOnly<u32, ISR::Register>),
        (0x14 => idr: WriteOnly<u32, ISR::Register>),
        (0x18 => imr: ReadOnly<u32, ISR::Register>),
        (0x1c => isr: ReadOnly<u32, ISR::Register>),
        (0x20 => keywr: [WriteOnly<u32>; 4]),
        (0x30 => _reserved1),
        (0x40 => idatar: [WriteOnly<u32>; 4]),
        (0x50 => odatar: [ReadOnly<u32>; 4]),
        (0x60 => ivr: [WriteOnly<u32>; 4]),
        (0x70 => @END),
    }
}

register_bitfields![u32,
    CR [
        START OFFSET(0) NUMBITS(1) [],
        SWRST OFFSET(8) NUMBITS(1) [],
    ],
    MR [
        CIPHER OFFSET(0) NUMBITS(1) [],
        AAHB OFFSET(2) NUMBITS(1) [],
        DUALBUFF OFFSET(3) NUMBITS(1) [],
        PROCDLY OFFSET(4) NUMBITS(4) [],
        SMOD OFFSET(8) NUMBITS(2) [
            Manual = 0,
            Auto = 1,
            IdatarStart = 2
        ],
        OPMOD OFFSET(12) NUMBITS(3) [
            Ecb = 0,
            Cbc = 1,
            Ofb = 2,
            Cfb = 3,
            Ctr = 4
        ],
        LOD OFFSET(15) NUMBITS(1) [],
        CKEY OFFSET(20) NUMBITS(4) [
            Passwd = 0xe
        ],
    ],
    ISR [
        DATRDY OFFSET(0) NUMBITS(1) [],
        URAD OFFSET(8) NUMBITS(1) [],
    ],
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperatingMode {
    Ecb,
    Cbc,
    Ofb,
    Cfb,
    Ctr,
}

#[derive(Copy, Clone, Debug)]
pub struct AesbConfig {
    pub mode: OperatingMode,
    /// Cipher accesses through the alias window automatically.
    pub automatic_bridge: bool,
    pub dual_buffer: bool,
    /// Extra processing clock cycles per block.
    pub processing_delay: u8,
}

pub struct AesbConfigBuilder {
    mode: OperatingMode,
    automatic_bridge: bool,
    dual_buffer: bool,
    processing_delay: u8,
}

impl Default for AesbConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AesbConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: OperatingMode::Ctr,
            automatic_bridge: true,
            dual_buffer: true,
            processing_delay: 0,
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: OperatingMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn automatic_bridge(mut self, enabled: bool) -> Self {
        self.automatic_bridge = enabled;
        self
    }

    #[must_use]
    pub fn dual_buffer(mut self, enabled: bool) -> Self {
        self.dual_buffer = enabled;
        self
    }

    #[must_use]
    pub fn processing_delay(mut self, cycles: u8) -> Self {
        self.processing_delay = cycles;
        self
    }

    #[must_use]
    pub fn build(self) -> AesbConfig {
        AesbConfig {
            mode: self.mode,
            automatic_bridge: self.automatic_bridge,
            dual_buffer: self.dual_buffer,
            processing_delay: self.processing_delay,
        }
    }
}

pub struct Aesb {
    base: usize,
}

impl Aesb {
    #[must_use]
    pub fn new(base: usize) -> Self {
        Self { base }
    }

    fn regs(&self) -> &AesbRegisters {
        unsafe { &*(self.base as *const AesbRegisters) }
    }

    pub fn swrst(&mut self) {
        self.regs().cr.write(CR::SWRST::SET);
    }

    /// Program the mode register. The key password field selects the
    /// automatically derived key, so no key material crosses the bus.
    pub fn configure(&mut self, config: &AesbConfig) {
        let opmod = match config.mode {
            OperatingMode::Ecb => MR::OPMOD::Ecb,
            OperatingMode::Cbc => MR::OPMOD::Cbc,
            OperatingMode::Ofb => MR::OPMOD::Ofb,
            OperatingMode::Cfb => MR::OPMOD::Cfb,
            OperatingMode::Ctr => MR::OPMOD::Ctr,
        };
        let mut mr = opmod
            + MR::SMOD::Auto
            + MR::PROCDLY.val(u32::from(config.processing_delay & 0xf))
            + MR::CKEY::Passwd;
        if config.automatic_bridge {
            mr += MR::AAHB::SET;
        }
        if config.dual_buffer {
            mr += MR::DUALBUFF::SET;
        }
        self.regs().mr.write(mr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_counter_mode_bridge() {
        let config = AesbConfigBuilder::new().build();
        assert_eq!(config.mode, OperatingMode::Ctr);
        assert!(config.automatic_bridge);
        assert!(config.dual_buffer);
        assert_eq!(config.processing_delay, 0);
    }

    #[test]
    fn builder_overrides() {
        let config = AesbConfigBuilder::new()
            .mode(OperatingMode::Ecb)
            .automatic_bridge(false)
            .processing_delay(3)
            .build();
        assert_eq!(config.mode, OperatingMode::Ecb);
        assert!(!config.automatic_bridge);
        assert_eq!(config.processing_delay, 3);
    }
}
