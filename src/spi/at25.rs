// Licensed under the Apache-2.0 license

//! AT25-family serial flash driver over any [`SpiDevice`].
//!
//! Probe by JEDEC identifier, then read, page program, and erase. Every
//! write-side operation waits for the part's busy flag to drop.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};

const CMD_READ_JEDEC_ID: u8 = 0x9f;
const CMD_READ_STATUS: u8 = 0x05;
const CMD_WRITE_STATUS: u8 = 0x01;
const CMD_WRITE_ENABLE: u8 = 0x06;
const CMD_WRITE_DISABLE: u8 = 0x04;
const CMD_READ_ARRAY: u8 = 0x03;
const CMD_PAGE_PROGRAM: u8 = 0x02;
const CMD_BLOCK_ERASE_4K: u8 = 0x20;
const CMD_BLOCK_ERASE_32K: u8 = 0x52;
const CMD_BLOCK_ERASE_64K: u8 = 0xd8;
const CMD_CHIP_ERASE: u8 = 0xc7;

/// Status register bits.
pub mod status {
    /// Busy with an internal write or erase.
    pub const RDYBSY: u8 = 0x01;
    /// Write enable latch.
    pub const WEL: u8 = 0x02;
    /// Software protection: both bits clear means fully unprotected.
    pub const SWP: u8 = 0x0c;
    /// Write protect pin asserted.
    pub const WPP: u8 = 0x10;
    /// Erase or program error.
    pub const EPE: u8 = 0x20;
    /// Sector protection register locked.
    pub const SPRL: u8 = 0x80;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The JEDEC identifier matched no known device.
    UnknownDevice(u32),
    /// Operation before a successful probe.
    NotProbed,
    /// Address or length falls outside the device.
    OutOfRange,
    /// The requested erase granularity is not a block size the device
    /// supports.
    UnsupportedEraseSize,
    /// Software protection could not be cleared.
    Protected,
    /// The part reported an erase/program failure.
    ProgramFailure,
    /// The busy flag never dropped.
    Timeout,
    /// Bus-level failure.
    Spi,
}

/// One entry of the JEDEC identification table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub jedec_id: u32,
    pub name: &'static str,
    /// Total size in bytes.
    pub size: u32,
    pub page_size: u32,
    /// Whether the 4 KiB block erase opcode is implemented.
    pub erase_4k: bool,
}

const DEVICES: &[DeviceInfo] = &[
    DeviceInfo { jedec_id: 0x0001_441f, name: "AT25DF041A", size: 512 * 1024, page_size: 256, erase_4k: true },
    DeviceInfo { jedec_id: 0x0001_451f, name: "AT26DF081A", size: 1024 * 1024, page_size: 256, erase_4k: true },
    DeviceInfo { jedec_id: 0x0001_461f, name: "AT26DF161A", size: 2 * 1024 * 1024, page_size: 256, erase_4k: true },
    DeviceInfo { jedec_id: 0x0002_461f, name: "AT25DF161", size: 2 * 1024 * 1024, page_size: 256, erase_4k: true },
    DeviceInfo { jedec_id: 0x0000_471f, name: "AT26DF321", size: 4 * 1024 * 1024, page_size: 256, erase_4k: false },
    DeviceInfo { jedec_id: 0x0001_471f, name: "AT25DF321A", size: 4 * 1024 * 1024, page_size: 256, erase_4k: true },
    DeviceInfo { jedec_id: 0x0000_481f, name: "AT25DF641", size: 8 * 1024 * 1024, page_size: 256, erase_4k: true },
];

/// Look a JEDEC identifier up in the device table.
#[must_use]
pub fn find_device(jedec_id: u32) -> Option<&'static DeviceInfo> {
    DEVICES.iter().find(|d| d.jedec_id == jedec_id)
}

// 500 us poll interval; chip erase on the largest part takes seconds.
const BUSY_POLL_INTERVAL_US: u32 = 500;
const BUSY_POLL_LIMIT: u32 = 200_000;
const UNPROTECT_RETRIES: u32 = 4;

pub struct At25<SPI, D> {
    spi: SPI,
    delay: D,
    device: Option<&'static DeviceInfo>,
}

impl<SPI: SpiDevice<u8>, D: DelayNs> At25<SPI, D> {
    pub fn new(spi: SPI, delay: D) -> Self {
        Self {
            spi,
            delay,
            device: None,
        }
    }

    /// Read the JEDEC identifier and match it against the device table.
    pub fn probe(&mut self) -> Result<&'static DeviceInfo, Error> {
        let mut id = [0u8; 3];
        self.spi
            .transaction(&mut [
                Operation::Write(&[CMD_READ_JEDEC_ID]),
                Operation::Read(&mut id),
            ])
            .map_err(|_| Error::Spi)?;
        let jedec = u32::from(id[0]) | u32::from(id[1]) << 8 | u32::from(id[2]) << 16;
        let device = find_device(jedec).ok_or(Error::UnknownDevice(jedec))?;
        self.device = Some(device);
        Ok(device)
    }

    /// Device description from the last successful probe.
    pub fn device(&self) -> Result<&'static DeviceInfo, Error> {
        self.device.ok_or(Error::NotProbed)
    }

    pub fn read_status(&mut self) -> Result<u8, Error> {
        let mut status = [0u8; 1];
        self.spi
            .transaction(&mut [
                Operation::Write(&[CMD_READ_STATUS]),
                Operation::Read(&mut status),
            ])
            .map_err(|_| Error::Spi)?;
        Ok(status[0])
    }

    fn write_command(&mut self, command: u8) -> Result<(), Error> {
        self.spi.write(&[command]).map_err(|_| Error::Spi)
    }

    pub fn write_enable(&mut self) -> Result<(), Error> {
        self.write_command(CMD_WRITE_ENABLE)
    }

    pub fn write_disable(&mut self) -> Result<(), Error> {
        self.write_command(CMD_WRITE_DISABLE)
    }

    fn wait_ready(&mut self) -> Result<(), Error> {
        for _ in 0..BUSY_POLL_LIMIT {
            let status = self.read_status()?;
            if status & status::RDYBSY == 0 {
                if status & status::EPE != 0 {
                    return Err(Error::ProgramFailure);
                }
                return Ok(());
            }
            self.delay.delay_us(BUSY_POLL_INTERVAL_US);
        }
        Err(Error::Timeout)
    }

    /// Clear software protection on the whole array. Some parts need the
    /// sequence repeated after power-up.
    pub fn unprotect(&mut self) -> Result<(), Error> {
        for _ in 0..UNPROTECT_RETRIES {
            if self.read_status()? & status::SWP == 0 {
                return Ok(());
            }
            self.write_enable()?;
            self.spi
                .write(&[CMD_WRITE_STATUS, 0])
                .map_err(|_| Error::Spi)?;
            self.wait_ready()?;
        }
        Err(Error::Protected)
    }

    fn check_range(&self, address: u32, len: usize) -> Result<&'static DeviceInfo, Error> {
        let device = self.device()?;
        let end = u64::from(address) + len as u64;
        if end > u64::from(device.size) {
            return Err(Error::OutOfRange);
        }
        Ok(device)
    }

    /// Read from the array at any byte address.
    pub fn read(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), Error> {
        self.check_range(address, buffer.len())?;
        let cmd = [
            CMD_READ_ARRAY,
            (address >> 16) as u8,
            (address >> 8) as u8,
            address as u8,
        ];
        self.spi
            .transaction(&mut [Operation::Write(&cmd), Operation::Read(buffer)])
            .map_err(|_| Error::Spi)
    }

    /// Program data at any byte address, split into page-sized writes.
    /// The destination must be erased first.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        let device = self.check_range(address, data.len())?;
        let page_size = device.page_size;
        let mut address = address;
        let mut remaining = data;
        while !remaining.is_empty() {
            let into_page = (address % page_size) as usize;
            let chunk_len = remaining
                .len()
                .min(page_size as usize - into_page);
            let (chunk, rest) = remaining.split_at(chunk_len);
            self.write_enable()?;
            let cmd = [
                CMD_PAGE_PROGRAM,
                (address >> 16) as u8,
                (address >> 8) as u8,
                address as u8,
            ];
            self.spi
                .transaction(&mut [Operation::Write(&cmd), Operation::Write(chunk)])
                .map_err(|_| Error::Spi)?;
            self.wait_ready()?;
            address += chunk_len as u32;
            remaining = rest;
        }
        Ok(())
    }

    /// Erase one block. `block_size` selects the opcode: 4 KiB, 32 KiB, or
    /// 64 KiB. The address must be aligned to the block size.
    pub fn erase_block(&mut self, address: u32, block_size: u32) -> Result<(), Error> {
        let device = self.check_range(address, 0)?;
        let opcode = match block_size {
            0x1000 if device.erase_4k => CMD_BLOCK_ERASE_4K,
            0x8000 => CMD_BLOCK_ERASE_32K,
            0x10000 => CMD_BLOCK_ERASE_64K,
            _ => return Err(Error::UnsupportedEraseSize),
        };
        if address % block_size != 0 {
            return Err(Error::OutOfRange);
        }
        self.write_enable()?;
        let cmd = [
            opcode,
            (address >> 16) as u8,
            (address >> 8) as u8,
            address as u8,
        ];
        self.spi.write(&cmd).map_err(|_| Error::Spi)?;
        self.wait_ready()
    }

    /// Erase the whole array.
    pub fn erase_chip(&mut self) -> Result<(), Error> {
        self.device()?;
        self.write_enable()?;
        self.write_command(CMD_CHIP_ERASE)?;
        self.wait_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use std::collections::VecDeque;
    use std::convert::Infallible;
    use std::vec::Vec;

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    /// Scripted SPI device: records written bytes, replays queued reads.
    #[derive(Default)]
    struct ScriptedSpi {
        written: Vec<Vec<u8>>,
        reads: VecDeque<Vec<u8>>,
    }

    impl embedded_hal::spi::ErrorType for ScriptedSpi {
        type Error = Infallible;
    }

    impl SpiDevice<u8> for ScriptedSpi {
        fn transaction(
            &mut self,
            operations: &mut [Operation<'_, u8>],
        ) -> Result<(), Infallible> {
            let mut txn = Vec::new();
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(buf) => txn.extend_from_slice(buf),
                    Operation::Read(buf) => {
                        let data = self.reads.pop_front().unwrap_or_default();
                        buf.copy_from_slice(&data);
                    }
                    _ => unimplemented!("not used by the driver"),
                }
            }
            self.written.push(txn);
            Ok(())
        }
    }

    fn probed_at25(spi_reads: &[Vec<u8>]) -> At25<ScriptedSpi, NoDelay> {
        let mut spi = ScriptedSpi::default();
        // JEDEC id of the AT25DF321A
        spi.reads.push_back(hex!("1f 47 01").to_vec());
        for read in spi_reads {
            spi.reads.push_back(read.clone());
        }
        let mut at25 = At25::new(spi, NoDelay);
        let info = at25.probe().unwrap();
        assert_eq!(info.name, "AT25DF321A");
        at25
    }

    #[test]
    fn probe_rejects_unknown_id() {
        let mut spi = ScriptedSpi::default();
        spi.reads.push_back(vec![0xff, 0xff, 0xff]);
        let mut at25 = At25::new(spi, NoDelay);
        assert_eq!(at25.probe(), Err(Error::UnknownDevice(0x00ff_ffff)));
        assert_eq!(at25.device(), Err(Error::NotProbed));
    }

    #[test]
    fn read_issues_command_with_big_endian_address() {
        let mut at25 = probed_at25(&[hex!("aabb").to_vec()]);
        let mut buf = [0u8; 2];
        at25.read(0x012345, &mut buf).unwrap();
        assert_eq!(buf, hex!("aabb"));
        let txn = at25.spi.written.last().unwrap();
        assert_eq!(&txn[..4], &hex!("03 01 23 45"));
    }

    #[test]
    fn read_beyond_device_end_is_out_of_range() {
        let mut at25 = probed_at25(&[]);
        let mut buf = [0u8; 16];
        assert_eq!(
            at25.read(4 * 1024 * 1024 - 8, &mut buf),
            Err(Error::OutOfRange)
        );
    }

    #[test]
    fn write_splits_on_page_boundaries() {
        // Status reads after each page program report ready
        let mut at25 = probed_at25(&[vec![0x00], vec![0x00], vec![0x00]]);
        let data = [0x55u8; 300];
        // Start 26 bytes before a page boundary
        at25.write(0x0100e6, &data).unwrap();
        let programs: Vec<_> = at25
            .spi
            .written
            .iter()
            .filter(|t| t.first() == Some(&0x02))
            .collect();
        assert_eq!(programs.len(), 3);
        assert_eq!(&programs[0][..4], &[0x02, 0x01, 0x00, 0xe6]);
        assert_eq!(programs[0].len(), 4 + 26);
        assert_eq!(&programs[1][..4], &[0x02, 0x01, 0x01, 0x00]);
        assert_eq!(programs[1].len(), 4 + 256);
        assert_eq!(&programs[2][..4], &[0x02, 0x01, 0x02, 0x00]);
        assert_eq!(programs[2].len(), 4 + 18);
    }

    #[test]
    fn erase_size_must_match_device_support() {
        let mut at25 = probed_at25(&[vec![0x00]]);
        assert_eq!(at25.erase_block(0x1000, 0x2000), Err(Error::UnsupportedEraseSize));
        assert_eq!(at25.erase_block(0x1234, 0x1000), Err(Error::OutOfRange));
        at25.erase_block(0x1000, 0x1000).unwrap();
        let txn = at25
            .spi
            .written
            .iter()
            .find(|t| t.first() == Some(&0x20))
            .unwrap();
        assert_eq!(&txn[..], &[0x20, 0x00, 0x10, 0x00]);
    }

    #[test]
    fn unprotect_sends_global_status_write() {
        // Protected, then ready after the status write, then unprotected
        let mut at25 = probed_at25(&[vec![status::SWP], vec![0x00], vec![0x00]]);
        at25.unprotect().unwrap();
        assert!(at25
            .spi
            .written
            .iter()
            .any(|t| t.as_slice() == [0x01, 0x00]));
    }

    #[test]
    fn program_failure_bit_is_reported() {
        let mut at25 = probed_at25(&[vec![status::EPE]]);
        let data = [0u8; 4];
        assert_eq!(at25.write(0, &data), Err(Error::ProgramFailure));
    }
}
