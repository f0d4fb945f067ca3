// Licensed under the Apache-2.0 license

//! SoC identity tables for the SAMA5D2 family: peripheral identifiers, base
//! addresses, matrix attachment and DMA interface lookups.
//!
//! The peripheral ID doubles as the index used by the PMC clock-gating
//! command register and by the interrupt controller.

/// Peripheral identifiers.
pub const ID_PIT: u32 = 3;
pub const ID_WDT: u32 = 4;
pub const ID_GMAC: u32 = 5;
pub const ID_XDMAC0: u32 = 6;
pub const ID_XDMAC1: u32 = 7;
pub const ID_ICM: u32 = 8;
pub const ID_AES: u32 = 9;
pub const ID_AESB: u32 = 10;
pub const ID_TDES: u32 = 11;
pub const ID_SHA: u32 = 12;
pub const ID_MPDDRC: u32 = 13;
pub const ID_MATRIX1: u32 = 14;
pub const ID_MATRIX0: u32 = 15;
pub const ID_SECUMOD: u32 = 16;
pub const ID_HSMC: u32 = 17;
pub const ID_PIOA: u32 = 18;
pub const ID_FLEXCOM0: u32 = 19;
pub const ID_FLEXCOM1: u32 = 20;
pub const ID_FLEXCOM2: u32 = 21;
pub const ID_FLEXCOM3: u32 = 22;
pub const ID_FLEXCOM4: u32 = 23;
pub const ID_UART0: u32 = 24;
pub const ID_UART1: u32 = 25;
pub const ID_UART2: u32 = 26;
pub const ID_UART3: u32 = 27;
pub const ID_UART4: u32 = 28;
pub const ID_TWIHS0: u32 = 29;
pub const ID_TWIHS1: u32 = 30;
pub const ID_SDMMC0: u32 = 31;
pub const ID_SDMMC1: u32 = 32;
pub const ID_SPI0: u32 = 33;
pub const ID_SPI1: u32 = 34;
pub const ID_TC0: u32 = 35;
pub const ID_TC1: u32 = 36;
pub const ID_PWM: u32 = 38;
pub const ID_ADC: u32 = 40;
pub const ID_UHPHS: u32 = 41;
pub const ID_UDPHS: u32 = 42;
pub const ID_SSC0: u32 = 43;
pub const ID_SSC1: u32 = 44;
pub const ID_LCDC: u32 = 45;
pub const ID_ISC: u32 = 46;
pub const ID_TRNG: u32 = 47;
pub const ID_PDMIC: u32 = 48;
pub const ID_IRQ: u32 = 49;
pub const ID_SFC: u32 = 50;
pub const ID_SECURAM: u32 = 51;
pub const ID_QSPI0: u32 = 52;
pub const ID_QSPI1: u32 = 53;
pub const ID_I2SC0: u32 = 54;
pub const ID_I2SC1: u32 = 55;
pub const ID_L2CC: u32 = 63;

/// Number of peripheral IDs.
pub const ID_PERIPH_COUNT: u32 = 64;

/// Peripheral base addresses.
pub const PMC_BASE: usize = 0xF001_4000;
pub const SCKC_BASE: usize = 0xF804_8050;
pub const AESB_BASE: usize = 0xF001_A000;
pub const XDMAC0_BASE: usize = 0xF001_0000;
pub const XDMAC1_BASE: usize = 0xF000_4000;
pub const QSPI0_BASE: usize = 0xF002_0000;
pub const QSPI1_BASE: usize = 0xF002_4000;
pub const SPI0_BASE: usize = 0xF800_0000;
pub const SPI1_BASE: usize = 0xFC00_0000;
pub const TWIHS0_BASE: usize = 0xF802_8000;
pub const TWIHS1_BASE: usize = 0xFC02_8000;
pub const UART0_BASE: usize = 0xF801_C000;
pub const UART1_BASE: usize = 0xF802_0000;
pub const UART2_BASE: usize = 0xF802_4000;
pub const UART3_BASE: usize = 0xFC00_8000;
pub const UART4_BASE: usize = 0xFC00_C000;
pub const PIO_BASE: usize = 0xFC03_8000;

/// QSPI serial-memory windows. Accesses through the AESB alias are
/// transparently encrypted/decrypted by the bridge.
pub const QSPI0_MEM_BASE: usize = 0xD000_0000;
pub const QSPI1_MEM_BASE: usize = 0xD800_0000;
pub const QSPI_AESB_MEM_BASE: usize = 0x9000_0000;

/// Returns true when the peripheral sits on the 64-bit AHB matrix (H64MX).
/// Everything else is reached through the 32-bit matrix (H32MX).
#[must_use]
pub fn is_h64mx_peripheral(id: u32) -> bool {
    matches!(
        id,
        ID_XDMAC0
            | ID_XDMAC1
            | ID_AES
            | ID_AESB
            | ID_SHA
            | ID_MPDDRC
            | ID_MATRIX0
            | ID_SDMMC0
            | ID_SDMMC1
            | ID_LCDC
            | ID_ISC
            | ID_QSPI0
            | ID_QSPI1
            | ID_L2CC
    )
}

/// Clock divider between MCK and the clock seen by a peripheral.
///
/// H64MX peripherals are clocked at MCK. H32MX peripherals are clocked at
/// MCK or MCK/2 depending on the `H32MXDIV` bit of `PMC_MCKR`, which the
/// caller samples (`h32mx_div2`). Returns `None` for IDs outside the table.
#[must_use]
pub fn peripheral_clock_divider(id: u32, h32mx_div2: bool) -> Option<u32> {
    if id < 2 || id >= ID_PERIPH_COUNT {
        return None;
    }
    if is_h64mx_peripheral(id) {
        Some(1)
    } else if h32mx_div2 {
        Some(2)
    } else {
        Some(1)
    }
}

struct XdmaEntry {
    id: u32,
    tx: u8,
    rx: u8,
}

const XDMA_NONE: u8 = 0xff;

// Hardware interface numbers shared by both XDMAC controllers.
const XDMA_TABLE: &[XdmaEntry] = &[
    XdmaEntry { id: ID_TWIHS0, tx: 0, rx: 1 },
    XdmaEntry { id: ID_TWIHS1, tx: 2, rx: 3 },
    XdmaEntry { id: ID_QSPI0, tx: 4, rx: 5 },
    XdmaEntry { id: ID_SPI0, tx: 6, rx: 7 },
    XdmaEntry { id: ID_SPI1, tx: 8, rx: 9 },
    XdmaEntry { id: ID_PWM, tx: 10, rx: XDMA_NONE },
    XdmaEntry { id: ID_FLEXCOM0, tx: 11, rx: 12 },
    XdmaEntry { id: ID_FLEXCOM1, tx: 13, rx: 14 },
    XdmaEntry { id: ID_FLEXCOM2, tx: 15, rx: 16 },
    XdmaEntry { id: ID_FLEXCOM3, tx: 17, rx: 18 },
    XdmaEntry { id: ID_FLEXCOM4, tx: 19, rx: 20 },
    XdmaEntry { id: ID_SSC0, tx: 21, rx: 22 },
    XdmaEntry { id: ID_SSC1, tx: 23, rx: 24 },
    XdmaEntry { id: ID_ADC, tx: XDMA_NONE, rx: 25 },
    XdmaEntry { id: ID_AES, tx: 26, rx: 27 },
    XdmaEntry { id: ID_TDES, tx: 28, rx: 29 },
    XdmaEntry { id: ID_SHA, tx: 30, rx: XDMA_NONE },
    XdmaEntry { id: ID_I2SC0, tx: 31, rx: 32 },
    XdmaEntry { id: ID_I2SC1, tx: 33, rx: 34 },
    XdmaEntry { id: ID_UART0, tx: 35, rx: 36 },
    XdmaEntry { id: ID_UART1, tx: 37, rx: 38 },
    XdmaEntry { id: ID_UART2, tx: 39, rx: 40 },
    XdmaEntry { id: ID_UART3, tx: 41, rx: 42 },
    XdmaEntry { id: ID_UART4, tx: 43, rx: 44 },
    XdmaEntry { id: ID_QSPI1, tx: 45, rx: 46 },
];

/// XDMAC hardware interface number for a peripheral, `None` when the
/// peripheral has no DMA request line in the requested direction.
#[must_use]
pub fn xdma_channel(id: u32, transmit: bool) -> Option<u8> {
    XDMA_TABLE.iter().find(|e| e.id == id).and_then(|e| {
        let ch = if transmit { e.tx } else { e.rx };
        (ch != XDMA_NONE).then_some(ch)
    })
}

/// Base address of a TWIHS instance.
#[must_use]
pub fn twi_base_from_id(id: u32) -> Option<usize> {
    match id {
        ID_TWIHS0 => Some(TWIHS0_BASE),
        ID_TWIHS1 => Some(TWIHS1_BASE),
        _ => None,
    }
}

/// Peripheral ID of the TWIHS instance at `base`.
#[must_use]
pub fn twi_id_from_base(base: usize) -> Option<u32> {
    match base {
        TWIHS0_BASE => Some(ID_TWIHS0),
        TWIHS1_BASE => Some(ID_TWIHS1),
        _ => None,
    }
}

/// Base address of an SPI instance.
#[must_use]
pub fn spi_base_from_id(id: u32) -> Option<usize> {
    match id {
        ID_SPI0 => Some(SPI0_BASE),
        ID_SPI1 => Some(SPI1_BASE),
        _ => None,
    }
}

/// Peripheral ID of the SPI instance at `base`.
#[must_use]
pub fn spi_id_from_base(base: usize) -> Option<u32> {
    match base {
        SPI0_BASE => Some(ID_SPI0),
        SPI1_BASE => Some(ID_SPI1),
        _ => None,
    }
}

/// Peripheral ID of the QSPI instance at `base`.
#[must_use]
pub fn qspi_id_from_base(base: usize) -> Option<u32> {
    match base {
        QSPI0_BASE => Some(ID_QSPI0),
        QSPI1_BASE => Some(ID_QSPI1),
        _ => None,
    }
}

/// Peripheral ID of the UART instance at `base`.
#[must_use]
pub fn uart_id_from_base(base: usize) -> Option<u32> {
    match base {
        UART0_BASE => Some(ID_UART0),
        UART1_BASE => Some(ID_UART1),
        UART2_BASE => Some(ID_UART2),
        UART3_BASE => Some(ID_UART3),
        UART4_BASE => Some(ID_UART4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h64mx_peripherals_always_run_at_mck() {
        assert_eq!(peripheral_clock_divider(ID_AESB, true), Some(1));
        assert_eq!(peripheral_clock_divider(ID_QSPI0, true), Some(1));
        assert_eq!(peripheral_clock_divider(ID_XDMAC0, false), Some(1));
    }

    #[test]
    fn h32mx_peripherals_follow_h32mxdiv() {
        assert_eq!(peripheral_clock_divider(ID_TWIHS0, false), Some(1));
        assert_eq!(peripheral_clock_divider(ID_TWIHS0, true), Some(2));
        assert_eq!(peripheral_clock_divider(ID_SPI0, true), Some(2));
        assert_eq!(peripheral_clock_divider(ID_UART1, true), Some(2));
    }

    #[test]
    fn clock_divider_rejects_out_of_range_ids() {
        assert_eq!(peripheral_clock_divider(0, false), None);
        assert_eq!(peripheral_clock_divider(1, false), None);
        assert_eq!(peripheral_clock_divider(ID_PERIPH_COUNT, false), None);
    }

    #[test]
    fn xdma_lookup_finds_both_directions() {
        assert_eq!(xdma_channel(ID_TWIHS0, true), Some(0));
        assert_eq!(xdma_channel(ID_TWIHS0, false), Some(1));
        assert_eq!(xdma_channel(ID_SPI1, true), Some(8));
        assert_eq!(xdma_channel(ID_QSPI0, false), Some(5));
    }

    #[test]
    fn xdma_lookup_reports_missing_request_lines() {
        // SHA is write-only from the DMA's point of view
        assert_eq!(xdma_channel(ID_SHA, true), Some(30));
        assert_eq!(xdma_channel(ID_SHA, false), None);
        // PIT has no DMA interface at all
        assert_eq!(xdma_channel(ID_PIT, true), None);
    }

    #[test]
    fn instance_lookups_round_trip() {
        assert_eq!(twi_base_from_id(ID_TWIHS1), Some(TWIHS1_BASE));
        assert_eq!(twi_id_from_base(TWIHS0_BASE), Some(ID_TWIHS0));
        assert_eq!(twi_id_from_base(0x1000), None);
        assert_eq!(spi_base_from_id(ID_SPI0), Some(SPI0_BASE));
        assert_eq!(spi_id_from_base(SPI1_BASE), Some(ID_SPI1));
        assert_eq!(spi_base_from_id(ID_UART0), None);
        assert_eq!(qspi_id_from_base(QSPI1_BASE), Some(ID_QSPI1));
        assert_eq!(uart_id_from_base(UART4_BASE), Some(ID_UART4));
    }
}
