// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Shared support for the ARM Cortex-M4 core of the gateway SoC.

#![no_std]

pub mod nvic;
pub mod scb;
pub mod support;
pub mod systick;

/// Default handler wired into unused vector table slots.
///
/// Any unexpected exception is an untrusted-code condition; spin and let the
/// hardware watchdog take the system down through its pre-timeout path.
pub unsafe extern "C" fn unhandled_interrupt() {
    loop {
        support::nop();
    }
}
