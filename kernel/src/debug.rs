// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Support for in-kernel debugging.
//!
//! The board registers a single [`IoWrite`] sink (the debug UART) during
//! early init; `debug!` statements anywhere in the workspace then format
//! through it. With no sink registered — notably in host tests — output is
//! discarded.
//!
//! Writes go out synchronously. The supervisory core logs rarely (error
//! paths and boot milestones), so no buffering layer is carried.

use core::fmt;

/// Byte-oriented sink for debug output.
pub trait IoWrite {
    fn write(&mut self, buf: &[u8]);
}

static mut DEBUG_WRITER: Option<&'static mut dyn IoWrite> = None;

/// Register the board's debug sink.
///
/// # Safety
///
/// Must be called once, before interrupts are enabled, so no ISR can race
/// the assignment.
pub unsafe fn set_writer(writer: &'static mut dyn IoWrite) {
    let slot = &mut *core::ptr::addr_of_mut!(DEBUG_WRITER);
    *slot = Some(writer);
}

struct FmtAdapter<'a> {
    inner: &'a mut dyn IoWrite,
}

impl fmt::Write for FmtAdapter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.inner.write(s.as_bytes());
        Ok(())
    }
}

/// Internal entry point used by the `debug!` macro.
pub fn write_fmt(args: fmt::Arguments) {
    use fmt::Write;
    // SAFETY: the writer is registered once before interrupts are enabled
    // and never replaced; interrupts do not nest, so a `debug!` in an ISR
    // cannot interleave with one it preempted mid-write on this platform
    // beyond losing character ordering, which is acceptable for a debug
    // sink.
    unsafe {
        let slot = &mut *core::ptr::addr_of_mut!(DEBUG_WRITER);
        if let Some(writer) = slot.as_deref_mut() {
            let _ = FmtAdapter { inner: writer }.write_fmt(args);
        }
    }
}

/// In-kernel `println()` over the registered debug sink.
#[macro_export]
macro_rules! debug {
    () => {
        $crate::debug::write_fmt(format_args!("\r\n"))
    };
    ($msg:expr $(,)?) => {
        $crate::debug::write_fmt(format_args!(concat!($msg, "\r\n")))
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::debug::write_fmt(format_args!(concat!($fmt, "\r\n"), $($arg)+))
    };
}
