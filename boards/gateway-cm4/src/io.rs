// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Debug I/O and the panic path.

use core::fmt;
use imxrt117x::lpuart::Lpuart;
use kernel::debug::IoWrite;

/// Writer used by `kernel::debug` and the panic handler for the serial
/// port.
pub struct Writer {
    initialized: bool,
}

/// Global static for the debug writer.
pub static mut WRITER: Writer = Writer { initialized: false };

impl IoWrite for Writer {
    fn write(&mut self, buf: &[u8]) {
        let uart = Lpuart::new_lpuart1();
        if !self.initialized {
            self.initialized = true;
            uart.enable_tx();
        }
        for &byte in buf {
            uart.send_byte(byte);
        }
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s.as_bytes());
        Ok(())
    }
}

/// Panic handler.
///
/// A panic on this core means the supervisory code itself cannot be
/// trusted; after dumping the message, take the same path as a hardware
/// watchdog expiry so the next boot lands in recovery mode.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[panic_handler]
pub unsafe fn panic_fmt(info: &core::panic::PanicInfo) -> ! {
    use core::fmt::Write;
    use core::ptr::addr_of_mut;

    let writer = &mut *addr_of_mut!(WRITER);
    let _ = write!(writer, "\r\nsupervisor panic: {}\r\n", info);

    let supervisor = &*core::ptr::addr_of!(crate::SUPERVISOR);
    if let Some(supervisor) = supervisor {
        supervisor.handle_hardware_watchdog_isr();
    }
    // Nothing persisted this early; the hardware watchdog finishes the
    // job on its own.
    loop {
        cortexm4::support::nop();
    }
}
