// Licensed under the Apache-2.0 license

//! Clock-tree arithmetic, separated from register access so it can be
//! exercised on the host.
//!
//! The tree: a slow clock (internal RC or 32.768 kHz crystal) and a main
//! clock (internal RC or crystal) feed PLLA; MCK selects one of
//! slow/main/PLLA/UPLL, runs it through a power-of-two prescaler and then
//! the master divider. The processor clock taps the tree before the master
//! divider, so it is MCK multiplied back up.

/// Frequency of the on-chip slow RC oscillator.
pub const SLOW_CLOCK_INT_OSC: u32 = 32_000;

/// Frequency of the on-chip main RC oscillator.
pub const MAIN_CLOCK_INT_OSC: u32 = 12_000_000;

/// Board-level crystal frequencies. The drivers cannot discover these; they
/// are fixed external facts about the board.
#[derive(Clone, Copy, Debug)]
pub struct BoardClocks {
    /// External main oscillator (crystal) frequency.
    pub main_xtal: u32,
    /// External 32.768 kHz slow crystal frequency.
    pub slow_xtal: u32,
}

impl Default for BoardClocks {
    fn default() -> Self {
        Self {
            main_xtal: 12_000_000,
            slow_xtal: 32_768,
        }
    }
}

/// Source feeding MCK, from the `CSS` field of `PMC_MCKR`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum MasterClockSource {
    SlowClock = 0,
    MainClock = 1,
    PllaClock = 2,
    UpllClock = 3,
}

impl MasterClockSource {
    #[must_use]
    pub fn from_field(css: u32) -> Self {
        match css & 0x3 {
            0 => Self::SlowClock,
            1 => Self::MainClock,
            2 => Self::PllaClock,
            _ => Self::UpllClock,
        }
    }
}

/// MCK prescaler, from the `PRES` field of `PMC_MCKR`. Powers of two up
/// to 64.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Prescaler {
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
    Div8 = 3,
    Div16 = 4,
    Div32 = 5,
    Div64 = 6,
}

impl Prescaler {
    #[must_use]
    pub fn from_field(pres: u32) -> Self {
        match pres & 0x7 {
            1 => Self::Div2,
            2 => Self::Div4,
            3 => Self::Div8,
            4 => Self::Div16,
            5 => Self::Div32,
            6 => Self::Div64,
            _ => Self::Div1,
        }
    }

    #[must_use]
    pub fn divisor(self) -> u32 {
        1 << (self as u32)
    }
}

/// Master clock divider, from the `MDIV` field of `PMC_MCKR`. Note the
/// field encoding is not monotonic: encoding 3 means divide by 3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum MckDivider {
    EqPck = 0,
    PckDiv2 = 1,
    PckDiv4 = 2,
    PckDiv3 = 3,
}

impl MckDivider {
    #[must_use]
    pub fn from_field(mdiv: u32) -> Self {
        match mdiv & 0x3 {
            1 => Self::PckDiv2,
            2 => Self::PckDiv4,
            3 => Self::PckDiv3,
            _ => Self::EqPck,
        }
    }

    #[must_use]
    pub fn divisor(self) -> u32 {
        match self {
            Self::EqPck => 1,
            Self::PckDiv2 => 2,
            Self::PckDiv4 => 4,
            Self::PckDiv3 => 3,
        }
    }
}

/// PLLA output for the given input and `CKGR_PLLAR`/`PMC_MCKR` fields.
///
/// A zero divider means the PLL is off; the output is 0, never a division
/// fault. The optional post-divider halves the output.
#[must_use]
pub fn plla_output(input: u32, mula: u32, diva: u32, div2: bool) -> u32 {
    if diva == 0 {
        return 0;
    }
    let mut out = (input as u64 * (mula as u64 + 1) / diva as u64) as u32;
    if div2 {
        out >>= 1;
    }
    out
}

/// MCK for a selected source frequency and the two divider stages.
#[must_use]
pub fn master_clock(source: u32, pres: Prescaler, mdiv: MckDivider) -> u32 {
    source / pres.divisor() / mdiv.divisor()
}

/// Processor clock: the tree point upstream of the master divider.
#[must_use]
pub fn processor_clock(mck: u32, mdiv: MckDivider) -> u32 {
    mck * mdiv.divisor()
}

/// Programmable clock output: selected source divided by `PRES + 1`.
#[must_use]
pub fn pck_output(source: u32, pres_field: u32) -> u32 {
    source / (pres_field + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prescaler_field_round_trip() {
        for pres in [
            Prescaler::Div1,
            Prescaler::Div2,
            Prescaler::Div4,
            Prescaler::Div8,
            Prescaler::Div16,
            Prescaler::Div32,
            Prescaler::Div64,
        ] {
            assert_eq!(Prescaler::from_field(pres as u32), pres);
        }
        assert_eq!(Prescaler::Div64.divisor(), 64);
        // Reserved encoding falls back to no division
        assert_eq!(Prescaler::from_field(7), Prescaler::Div1);
    }

    #[test]
    fn mck_divider_encoding_is_not_monotonic() {
        assert_eq!(MckDivider::from_field(2).divisor(), 4);
        assert_eq!(MckDivider::from_field(3).divisor(), 3);
    }

    #[test]
    fn plla_at_nominal_board_settings() {
        // 12 MHz crystal, MULA=82, DIVA=1, /2 => 498 MHz
        assert_eq!(plla_output(12_000_000, 82, 1, true), 498_000_000);
        assert_eq!(plla_output(12_000_000, 82, 1, false), 996_000_000);
    }

    #[test]
    fn plla_off_when_divider_is_zero() {
        assert_eq!(plla_output(12_000_000, 82, 0, false), 0);
        assert_eq!(plla_output(12_000_000, 82, 0, true), 0);
    }

    #[test]
    fn plla_intermediate_product_does_not_overflow() {
        // 24 MHz crystal at the max multiplier exceeds u32 before division
        let out = plla_output(24_000_000, 127, 2, false);
        assert_eq!(out, 24_000_000u64.wrapping_mul(128).wrapping_div(2) as u32);
    }

    #[test]
    fn master_clock_applies_both_stages() {
        // 498 MHz PLLA, PRES=/1, MDIV=/3 => 166 MHz
        assert_eq!(
            master_clock(498_000_000, Prescaler::Div1, MckDivider::PckDiv3),
            166_000_000
        );
        assert_eq!(
            master_clock(12_000_000, Prescaler::Div4, MckDivider::PckDiv2),
            1_500_000
        );
    }

    #[test]
    fn processor_clock_undoes_master_divider() {
        let mck = master_clock(498_000_000, Prescaler::Div1, MckDivider::PckDiv3);
        assert_eq!(processor_clock(mck, MckDivider::PckDiv3), 498_000_000);
        assert_eq!(processor_clock(mck, MckDivider::EqPck), mck);
    }

    #[test]
    fn pck_divides_by_pres_plus_one() {
        assert_eq!(pck_output(166_000_000, 0), 166_000_000);
        assert_eq!(pck_output(166_000_000, 3), 41_500_000);
    }

    #[test]
    fn css_field_decodes() {
        assert_eq!(MasterClockSource::from_field(0), MasterClockSource::SlowClock);
        assert_eq!(MasterClockSource::from_field(2), MasterClockSource::PllaClock);
        assert_eq!(MasterClockSource::from_field(3), MasterClockSource::UpllClock);
    }
}
