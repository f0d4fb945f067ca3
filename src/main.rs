// Licensed under the Apache-2.0 license

//! Demo image: bring up the console, run the QSPI/AESB check once, then
//! serve the serial flash console forever.
//!
//! Startup code and the interrupt vector table are board glue that lives
//! outside this crate; it calls `boot_main` with the MMU and stacks ready
//! and routes the console UART interrupt to `console_uart_irq`.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
use panic_halt as _;

#[cfg(target_os = "none")]
mod demo {
    use embedded_io::Write;

    use sama5_ddk::chip;
    use sama5_ddk::common::CycleDelay;
    use sama5_ddk::demos;
    use sama5_ddk::pio::{Pin, Pio, PioFunc, PioGroup};
    use sama5_ddk::pmc::{BoardClocks, Pmc};
    use sama5_ddk::qspi::flash::QspiFlash;
    use sama5_ddk::qspi::QspiController;
    use sama5_ddk::spi::at25::At25;
    use sama5_ddk::spi::{SpiConfig, SpiController};
    use sama5_ddk::uart::{UartConfig, UartController};

    // Console on UART0, flash on SPI0 CS0 and QSPI0: PB26/PB27 (UART0),
    // PA14..PA17 (SPI0), PA22..PA27 (QSPI0).
    const BOARD_PINS: &[Pin] = &[
        Pin::peripheral(PioGroup::B, 0x0c00_0000, PioFunc::PeriphC),
        Pin::peripheral(PioGroup::A, 0x0003_c000, PioFunc::PeriphA),
        Pin::peripheral(PioGroup::A, 0x0fc0_0000, PioFunc::PeriphB),
    ];

    const SPI_FLASH_BITRATE: u32 = 8_000_000;
    const QSPI_BITRATE: u32 = 50_000_000;

    fn halt() -> ! {
        loop {
            #[cfg(target_arch = "arm")]
            unsafe {
                core::arch::asm!("wfi");
            }
            #[cfg(not(target_arch = "arm"))]
            core::hint::spin_loop();
        }
    }

    pub fn main() -> ! {
        let mut pmc = Pmc::new(BoardClocks::default());
        let mut pio = Pio::new(chip::PIO_BASE);

        for id in [
            chip::ID_PIOA,
            chip::ID_UART0,
            chip::ID_SPI0,
            chip::ID_QSPI0,
        ] {
            if pmc.enable_peripheral(id).is_err() {
                halt();
            }
        }
        pio.configure_all(BOARD_PINS);

        let mut uart = UartController::new(chip::UART0_BASE);
        let Ok(uart_hz) = pmc.peripheral_clock(chip::ID_UART0) else {
            halt();
        };
        if uart.init(&UartConfig::default(), uart_hz.raw()).is_err() {
            halt();
        }
        let _ = writeln!(uart, "\r\n-- sama5-ddk serial flash demo --\r");

        let Ok(qspi_hz) = pmc.peripheral_clock(chip::ID_QSPI0) else {
            halt();
        };
        let mut qspi = QspiController::new(
            chip::QSPI0_BASE,
            chip::QSPI0_MEM_BASE,
            chip::QSPI_AESB_MEM_BASE,
        );
        qspi.init();
        match qspi.set_baudrate(qspi_hz.raw(), QSPI_BITRATE) {
            Ok(rate) => {
                let _ = writeln!(uart, "-I- qspi serial clock {} Hz\r", rate);
            }
            Err(e) => {
                let _ = writeln!(uart, "-E- qspi: {e:?}\r");
                halt();
            }
        }
        let mut qspi_flash = QspiFlash::new(qspi, CycleDelay);
        if demos::qspi_aesb::run_qspi_aesb(&mut uart, &mut pmc, &mut qspi_flash) {
            let _ = writeln!(uart, "-I- qspi/aesb demo passed\r");
        } else {
            let _ = writeln!(uart, "-E- qspi/aesb demo failed\r");
        }

        let Ok(spi_hz) = pmc.peripheral_clock(chip::ID_SPI0) else {
            halt();
        };
        let mut spi = SpiController::new(chip::SPI0_BASE);
        let config = SpiConfig {
            bitrate_hz: SPI_FLASH_BITRATE,
            ..SpiConfig::default()
        };
        if let Err(e) = spi.configure(&config, spi_hz.raw()) {
            let _ = writeln!(uart, "-E- spi: {e:?}\r");
            halt();
        }
        let mut at25 = At25::new(spi, CycleDelay);

        // Interrupts stay masked until the console loop is ready
        #[cfg(target_arch = "arm")]
        unsafe {
            core::arch::asm!("cpsie i");
        }
        demos::serialflash::run_serialflash(&mut uart, &mut at25)
    }

    /// Console UART interrupt entry, wired by the board vector table.
    #[no_mangle]
    pub extern "C" fn console_uart_irq() {
        let mut uart = UartController::new(chip::UART0_BASE);
        demos::console_rx_interrupt(&mut uart);
    }
}

#[cfg(target_os = "none")]
#[no_mangle]
pub extern "C" fn boot_main() -> ! {
    demo::main()
}

#[cfg(not(target_os = "none"))]
fn main() {}
