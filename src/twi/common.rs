// Licensed under the Apache-2.0 license

//! Shared TWI types: bus speeds, configuration builder, errors, and the
//! clock waveform computation.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum TwiSpeed {
    Standard = 100_000,
    Fast = 400_000,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// No CKDIV/CLDIV pair reaches the requested bus clock from the
    /// peripheral clock.
    BusClockUnreachable,
    /// Target address beyond the 7-bit range.
    AddressOutOfRange,
    /// Internal (register) address longer than the 3 bytes the IADR field
    /// holds.
    InternalAddressTooLong,
    /// Target did not acknowledge.
    Nack,
    /// A status poll gave up.
    Timeout,
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        match self {
            Error::Nack => embedded_hal::i2c::ErrorKind::NoAcknowledge(
                embedded_hal::i2c::NoAcknowledgeSource::Unknown,
            ),
            _ => embedded_hal::i2c::ErrorKind::Other,
        }
    }
}

pub struct TwiConfig {
    pub speed: TwiSpeed,
    /// Target address to respond on, `twi_target` builds only.
    pub target_address: Option<u8>,
}

pub struct TwiConfigBuilder {
    speed: TwiSpeed,
    target_address: Option<u8>,
}

impl Default for TwiConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TwiConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: TwiSpeed::Standard,
            target_address: None,
        }
    }

    #[must_use]
    pub fn speed(mut self, speed: TwiSpeed) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub fn target_address(mut self, address: u8) -> Self {
        self.target_address = Some(address);
        self
    }

    #[must_use]
    pub fn build(self) -> TwiConfig {
        TwiConfig {
            speed: self.speed,
            target_address: self.target_address,
        }
    }
}

/// CWGR divider fields. Low and high phases are kept symmetric.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockWaveform {
    pub ckdiv: u32,
    pub cldiv: u32,
}

/// Compute CWGR dividers for a bus clock.
///
/// SCL low/high each last `((CLDIV << CKDIV) + 3)` peripheral clock periods,
/// so the target is the smallest CKDIV whose CLDIV fits in 8 bits. CLDIV
/// rounds up, so the achieved rate never exceeds the request.
pub fn clock_waveform(periph_hz: u32, bus_hz: u32) -> Result<ClockWaveform, Error> {
    if bus_hz == 0 {
        return Err(Error::BusClockUnreachable);
    }
    let half_periods = (periph_hz / (2 * bus_hz)).saturating_sub(3);
    for ckdiv in 0..8 {
        let cldiv = half_periods.div_ceil(1 << ckdiv);
        if cldiv <= 255 {
            return Ok(ClockWaveform { ckdiv, cldiv });
        }
    }
    Err(Error::BusClockUnreachable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_speed_from_83mhz_peripheral_clock() {
        // 83 MHz / (2 * 100 kHz) - 3 = 412, needs one CKDIV step
        let w = clock_waveform(83_000_000, 100_000).unwrap();
        assert_eq!(w, ClockWaveform { ckdiv: 1, cldiv: 206 });
    }

    #[test]
    fn fast_speed_fits_without_ckdiv() {
        let w = clock_waveform(83_000_000, 400_000).unwrap();
        assert_eq!(w.ckdiv, 0);
        assert_eq!(w.cldiv, 100);
    }

    #[test]
    fn slow_bus_from_fast_clock_never_exceeds_the_request() {
        // 166 MHz / (2 * 10 kHz) - 3 = 8297; CKDIV=6 rounds CLDIV up to 130
        let w = clock_waveform(166_000_000, 10_000).unwrap();
        assert_eq!(w, ClockWaveform { ckdiv: 6, cldiv: 130 });
        // Dividers must reproduce at most the requested rate
        let half = (w.cldiv << w.ckdiv) + 3;
        assert!(166_000_000 / (2 * half) <= 10_000);
    }

    #[test]
    fn unreachable_bus_clock_is_an_error() {
        // 8 CKDIV steps cannot bring this into range
        assert_eq!(
            clock_waveform(u32::MAX, 1),
            Err(Error::BusClockUnreachable)
        );
        assert_eq!(clock_waveform(83_000_000, 0), Err(Error::BusClockUnreachable));
    }

    #[test]
    fn bus_faster_than_peripheral_clamps_to_zero_divider() {
        let w = clock_waveform(1_000_000, 400_000).unwrap();
        assert_eq!(w, ClockWaveform { ckdiv: 0, cldiv: 0 });
    }

    #[test]
    fn builder_defaults() {
        let config = TwiConfigBuilder::new().build();
        assert_eq!(config.speed, TwiSpeed::Standard);
        assert!(config.target_address.is_none());
    }
}
