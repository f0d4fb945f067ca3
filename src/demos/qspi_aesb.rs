// Licensed under the Apache-2.0 license

//! QSPI + AESB demonstration.
//!
//! Writes a pattern to flash through the AESB alias window, proves it reads
//! back identically through the same window, then reads the raw array
//! through the plain window to show the stored bytes are ciphertext.

use embedded_hal::delay::DelayNs;
use embedded_io::Write;

use crate::aesb::{Aesb, AesbConfigBuilder};
use crate::chip;
use crate::pmc::Pmc;
use crate::qspi::flash::{Error, QspiFlash};
use crate::uart::UartController;

const TEST_ADDRESS: u32 = 0;
const PATTERN_LEN: usize = 256;

fn walking_bit(buffer: &mut [u8]) {
    for (i, byte) in buffer.iter_mut().enumerate() {
        *byte = 1 << (i % 8);
    }
}

fn run_inner<D: DelayNs>(
    uart: &mut UartController,
    flash: &mut QspiFlash<D>,
) -> Result<bool, Error> {
    let info = flash.probe()?;
    let _ = writeln!(uart, "-I- found {} ({} KiB)\r", info.name, info.size / 1024);

    let mut pattern = [0u8; PATTERN_LEN];
    walking_bit(&mut pattern);

    flash.erase_block(TEST_ADDRESS, 0x1000)?;

    // Program and verify through the cipher window
    flash.use_aesb(true);
    flash.write(TEST_ADDRESS, &pattern)?;
    let mut readback = [0u8; PATTERN_LEN];
    flash.read(TEST_ADDRESS, &mut readback)?;
    if readback != pattern {
        let _ = writeln!(uart, "-E- ciphered readback does not match\r");
        return Ok(false);
    }
    let _ = writeln!(uart, "-I- ciphered window: pattern matches\r");

    // The plain window must expose the ciphertext
    flash.use_aesb(false);
    flash.read(TEST_ADDRESS, &mut readback)?;
    if readback == pattern {
        let _ = writeln!(uart, "-E- plaintext visible in the raw array\r");
        return Ok(false);
    }
    let _ = writeln!(uart, "-I- plain window: ciphertext differs, as expected\r");
    Ok(true)
}

/// Run the scrambled-flash demonstration once. Returns whether every check
/// passed.
pub fn run_qspi_aesb<D: DelayNs>(
    uart: &mut UartController,
    pmc: &mut Pmc,
    flash: &mut QspiFlash<D>,
) -> bool {
    if let Err(e) = pmc.enable_peripheral(chip::ID_AESB) {
        let _ = writeln!(uart, "-E- pmc: {e:?}\r");
        return false;
    }

    let mut aesb = Aesb::new(chip::AESB_BASE);
    aesb.swrst();
    aesb.configure(&AesbConfigBuilder::new().build());

    match run_inner(uart, flash) {
        Ok(passed) => passed,
        Err(e) => {
            let _ = writeln!(uart, "-E- flash: {e:?}\r");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walking_bit_pattern_cycles_every_byte() {
        let mut buf = [0u8; 16];
        walking_bit(&mut buf);
        assert_eq!(&buf[..8], &[0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80]);
        assert_eq!(buf[8], 0x01);
    }
}
