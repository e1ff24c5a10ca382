// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Macros for statically allocating board resources.

/// Allocates a statically-sized global region of memory and initializes the
/// memory for a particular data structure, returning a `'static mut`
/// reference to it.
///
/// This macro creates the static buffer and initializes it at runtime, which
/// allows values that are not `const`-constructible (peripheral drivers
/// holding runtime state) to still live in static memory.
///
/// # Safety
///
/// Each expansion site must execute at most once; running it twice would
/// hand out a second mutable reference to the same buffer. Board `main` is
/// the only caller and runs once, before interrupts are enabled.
#[macro_export]
macro_rules! static_init {
    ($T:ty, $e:expr $(,)?) => {{
        static mut BUF: Option<$T> = None;
        let buf: &'static mut Option<$T> = &mut *core::ptr::addr_of_mut!(BUF);
        buf.insert($e)
    }};
}
