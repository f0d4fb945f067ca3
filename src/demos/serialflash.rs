// Licensed under the Apache-2.0 license

//! Serial flash mini-console.
//!
//! Commands, one per line, numbers decimal or `0x` hex:
//!
//! ```text
//! r <addr> <size>              read and hex-dump
//! w <addr> <value>             program the 32-bit value, little-endian
//! d <addr> <4k|32k|64k|256k>   erase one block
//! d all                        erase the whole chip
//! a status                     dump the status register
//! a device                     dump the probed device
//! ```
//!
//! Parse errors report usage and continue; driver errors trace and abort
//! the command.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use embedded_io::Write;

use super::take_command_line;
use crate::console::{parse_number, split_command};
use crate::spi::at25::{status, At25, Error};
use crate::uart::UartController;

fn report(uart: &mut UartController, error: Error) {
    let _ = writeln!(uart, "-E- flash: {error:?}\r");
}

fn usage(uart: &mut UartController) {
    let _ = writeln!(
        uart,
        "usage: r <addr> <size> | w <addr> <value> | d <addr> <4k|32k|64k|256k> | d all | a status|device\r"
    );
}

fn dump<SPI: SpiDevice<u8>, D: DelayNs>(
    uart: &mut UartController,
    flash: &mut At25<SPI, D>,
    address: u32,
    size: u32,
) -> Result<(), Error> {
    let mut offset = 0;
    while offset < size {
        let mut row = [0u8; 16];
        let len = (size - offset).min(16) as usize;
        let Some(row) = row.get_mut(..len) else {
            break;
        };
        flash.read(address + offset, row)?;
        let _ = write!(uart, "{:08x}:", address + offset);
        for byte in row.iter() {
            let _ = write!(uart, " {byte:02x}");
        }
        let _ = write!(uart, "\r\n");
        offset += len as u32;
    }
    Ok(())
}

fn cmd_read<SPI: SpiDevice<u8>, D: DelayNs>(
    uart: &mut UartController,
    flash: &mut At25<SPI, D>,
    args: &str,
) {
    let (addr, rest) = split_command(args);
    let (size, _) = split_command(rest);
    let (Some(addr), Some(size)) = (parse_number(addr), parse_number(size)) else {
        usage(uart);
        return;
    };
    if let Err(e) = dump(uart, flash, addr, size) {
        report(uart, e);
    }
}

fn cmd_write<SPI: SpiDevice<u8>, D: DelayNs>(
    uart: &mut UartController,
    flash: &mut At25<SPI, D>,
    args: &str,
) {
    let (addr, rest) = split_command(args);
    let (value, _) = split_command(rest);
    let (Some(addr), Some(value)) = (parse_number(addr), parse_number(value)) else {
        usage(uart);
        return;
    };
    match flash.write(addr, &value.to_le_bytes()) {
        Ok(()) => {
            let _ = writeln!(uart, "-I- wrote 0x{value:08x} at 0x{addr:08x}\r");
        }
        Err(e) => report(uart, e),
    }
}

fn cmd_erase<SPI: SpiDevice<u8>, D: DelayNs>(
    uart: &mut UartController,
    flash: &mut At25<SPI, D>,
    args: &str,
) {
    let (first, rest) = split_command(args);
    if first == "all" {
        let _ = writeln!(uart, "-I- erasing chip, this takes a while\r");
        match flash.erase_chip() {
            Ok(()) => {
                let _ = writeln!(uart, "-I- chip erased\r");
            }
            Err(e) => report(uart, e),
        }
        return;
    }
    let (granularity, _) = split_command(rest);
    let block_size = match granularity {
        "4k" => 0x1000,
        "32k" => 0x8000,
        "64k" => 0x10000,
        "256k" => 0x40000,
        _ => {
            usage(uart);
            return;
        }
    };
    let Some(addr) = parse_number(first) else {
        usage(uart);
        return;
    };
    match flash.erase_block(addr, block_size) {
        Ok(()) => {
            let _ = writeln!(uart, "-I- erased {granularity} block at 0x{addr:08x}\r");
        }
        Err(e) => report(uart, e),
    }
}

fn cmd_query<SPI: SpiDevice<u8>, D: DelayNs>(
    uart: &mut UartController,
    flash: &mut At25<SPI, D>,
    args: &str,
) {
    let (what, _) = split_command(args);
    match what {
        "status" => match flash.read_status() {
            Ok(sr) => {
                let _ = writeln!(
                    uart,
                    "-I- status 0x{sr:02x} busy={} wel={} swp={} sprl={}\r",
                    sr & status::RDYBSY != 0,
                    sr & status::WEL != 0,
                    sr & status::SWP != 0,
                    sr & status::SPRL != 0,
                );
            }
            Err(e) => report(uart, e),
        },
        "device" => match flash.device() {
            Ok(info) => {
                let _ = writeln!(
                    uart,
                    "-I- {} {} KiB, page {} B\r",
                    info.name,
                    info.size / 1024,
                    info.page_size
                );
            }
            Err(e) => report(uart, e),
        },
        _ => usage(uart),
    }
}

fn execute<SPI: SpiDevice<u8>, D: DelayNs>(
    uart: &mut UartController,
    flash: &mut At25<SPI, D>,
    line: &str,
) {
    let (command, args) = split_command(line);
    match command {
        "" => {}
        "r" => cmd_read(uart, flash, args),
        "w" => cmd_write(uart, flash, args),
        "d" => cmd_erase(uart, flash, args),
        "a" => cmd_query(uart, flash, args),
        _ => usage(uart),
    }
    let _ = write!(uart, "> ");
}

/// Probe and unprotect the part, then serve console commands forever.
pub fn run_serialflash<SPI: SpiDevice<u8>, D: DelayNs>(
    uart: &mut UartController,
    flash: &mut At25<SPI, D>,
) -> ! {
    match flash.probe() {
        Ok(info) => {
            let _ = writeln!(uart, "-I- found {} ({} KiB)\r", info.name, info.size / 1024);
        }
        Err(e) => {
            report(uart, e);
            loop {
                core::hint::spin_loop();
            }
        }
    }
    if let Err(e) = flash.unprotect() {
        report(uart, e);
    }
    uart.enable_rx_interrupt();
    let _ = write!(uart, "> ");
    loop {
        if let Some(line) = take_command_line() {
            execute(uart, flash, line.as_str());
        }
    }
}
