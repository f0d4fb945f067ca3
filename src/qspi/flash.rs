// Licensed under the Apache-2.0 license

//! Serial flash driver on top of the QSPI controller.
//!
//! Same command set as the SPI flash driver, but array reads use the fast
//! read opcode through the memory window, and all data phases can be routed
//! through the AESB alias for transparent scrambling.

use embedded_hal::delay::DelayNs;

use super::{Error as QspiError, QspiCommand, QspiController, QspiWidth};

const CMD_READ_JEDEC_ID: u8 = 0x9f;
const CMD_READ_STATUS: u8 = 0x05;
const CMD_WRITE_ENABLE: u8 = 0x06;
const CMD_FAST_READ: u8 = 0x0b;
const CMD_PAGE_PROGRAM: u8 = 0x02;
const CMD_BLOCK_ERASE_4K: u8 = 0x20;
const CMD_BLOCK_ERASE_32K: u8 = 0x52;
const CMD_BLOCK_ERASE_64K: u8 = 0xd8;
const CMD_CHIP_ERASE: u8 = 0xc7;

const STATUS_BUSY: u8 = 0x01;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The JEDEC identifier matched no known device.
    UnknownDevice(u32),
    /// Operation before a successful probe.
    NotProbed,
    /// Address or length falls outside the device.
    OutOfRange,
    /// The requested erase granularity has no opcode.
    UnsupportedEraseSize,
    /// The busy flag never dropped.
    Timeout,
    /// Controller-level failure.
    Controller(QspiError),
}

impl From<QspiError> for Error {
    fn from(e: QspiError) -> Self {
        Error::Controller(e)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct DeviceInfo {
    pub jedec_id: u32,
    pub name: &'static str,
    pub size: u32,
    pub page_size: u32,
}

const DEVICES: &[DeviceInfo] = &[
    DeviceInfo { jedec_id: 0x0018_20c2, name: "MX25L12835F", size: 16 * 1024 * 1024, page_size: 256 },
    DeviceInfo { jedec_id: 0x0019_20c2, name: "MX25L25635E", size: 32 * 1024 * 1024, page_size: 256 },
    DeviceInfo { jedec_id: 0x0043_26bf, name: "SST26VF064B", size: 8 * 1024 * 1024, page_size: 256 },
    DeviceInfo { jedec_id: 0x0018_ba20, name: "N25Q128A", size: 16 * 1024 * 1024, page_size: 256 },
    DeviceInfo { jedec_id: 0x0017_40ef, name: "W25Q64", size: 8 * 1024 * 1024, page_size: 256 },
];

#[must_use]
pub fn find_device(jedec_id: u32) -> Option<&'static DeviceInfo> {
    DEVICES.iter().find(|d| d.jedec_id == jedec_id)
}

const BUSY_POLL_INTERVAL_US: u32 = 500;
const BUSY_POLL_LIMIT: u32 = 200_000;

pub struct QspiFlash<D> {
    qspi: QspiController,
    delay: D,
    device: Option<&'static DeviceInfo>,
}

impl<D: DelayNs> QspiFlash<D> {
    pub fn new(qspi: QspiController, delay: D) -> Self {
        Self {
            qspi,
            delay,
            device: None,
        }
    }

    /// Route the data path through the AESB alias window.
    pub fn use_aesb(&mut self, enabled: bool) {
        self.qspi.use_aesb(enabled);
    }

    /// Read the JEDEC identifier and match it against the device table.
    pub fn probe(&mut self) -> Result<&'static DeviceInfo, Error> {
        let mut id = [0u8; 3];
        self.qspi
            .read_data(&QspiCommand::simple(CMD_READ_JEDEC_ID), &mut id, false)?;
        let jedec = u32::from(id[0]) | u32::from(id[1]) << 8 | u32::from(id[2]) << 16;
        let device = find_device(jedec).ok_or(Error::UnknownDevice(jedec))?;
        self.device = Some(device);
        Ok(device)
    }

    pub fn device(&self) -> Result<&'static DeviceInfo, Error> {
        self.device.ok_or(Error::NotProbed)
    }

    pub fn read_status(&mut self) -> Result<u8, Error> {
        let mut status = [0u8; 1];
        self.qspi
            .read_data(&QspiCommand::simple(CMD_READ_STATUS), &mut status, false)?;
        Ok(status[0])
    }

    fn write_enable(&mut self) -> Result<(), Error> {
        self.qspi
            .send_command(&QspiCommand::simple(CMD_WRITE_ENABLE))?;
        Ok(())
    }

    fn wait_ready(&mut self) -> Result<(), Error> {
        for _ in 0..BUSY_POLL_LIMIT {
            if self.read_status()? & STATUS_BUSY == 0 {
                return Ok(());
            }
            self.delay.delay_us(BUSY_POLL_INTERVAL_US);
        }
        Err(Error::Timeout)
    }

    fn check_range(&self, address: u32, len: usize) -> Result<&'static DeviceInfo, Error> {
        let device = self.device()?;
        if u64::from(address) + len as u64 > u64::from(device.size) {
            return Err(Error::OutOfRange);
        }
        Ok(device)
    }

    /// Fast read through the memory window.
    pub fn read(&mut self, address: u32, buffer: &mut [u8]) -> Result<(), Error> {
        self.check_range(address, buffer.len())?;
        let cmd = QspiCommand {
            dummy_cycles: 8,
            width: QspiWidth::Single,
            ..QspiCommand::with_address(CMD_FAST_READ, address)
        };
        self.qspi.read_data(&cmd, buffer, true)?;
        Ok(())
    }

    /// Program data, split into page-sized writes.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        let device = self.check_range(address, data.len())?;
        let page_size = device.page_size;
        let mut address = address;
        let mut remaining = data;
        while !remaining.is_empty() {
            let into_page = (address % page_size) as usize;
            let chunk_len = remaining.len().min(page_size as usize - into_page);
            let (chunk, rest) = remaining.split_at(chunk_len);
            self.write_enable()?;
            self.qspi
                .write_data(&QspiCommand::with_address(CMD_PAGE_PROGRAM, address), chunk)?;
            self.wait_ready()?;
            address += chunk_len as u32;
            remaining = rest;
        }
        Ok(())
    }

    /// Erase one block of 4 KiB, 32 KiB, or 64 KiB at an aligned address.
    pub fn erase_block(&mut self, address: u32, block_size: u32) -> Result<(), Error> {
        self.check_range(address, 0)?;
        let opcode = match block_size {
            0x1000 => CMD_BLOCK_ERASE_4K,
            0x8000 => CMD_BLOCK_ERASE_32K,
            0x10000 => CMD_BLOCK_ERASE_64K,
            _ => return Err(Error::UnsupportedEraseSize),
        };
        if address % block_size != 0 {
            return Err(Error::OutOfRange);
        }
        self.write_enable()?;
        self.qspi
            .send_command(&QspiCommand::with_address(opcode, address))?;
        self.wait_ready()
    }

    pub fn erase_chip(&mut self) -> Result<(), Error> {
        self.device()?;
        self.write_enable()?;
        self.qspi.send_command(&QspiCommand::simple(CMD_CHIP_ERASE))?;
        self.wait_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_table_lookup() {
        let d = find_device(0x0043_26bf).unwrap();
        assert_eq!(d.name, "SST26VF064B");
        assert_eq!(d.size, 8 * 1024 * 1024);
        assert!(find_device(0x00ff_ffff).is_none());
    }
}
