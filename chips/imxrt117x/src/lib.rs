// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Peripheral drivers for the i.MX RT117x used by the supervisory (CM4)
//! core.
//!
//! Only the peripherals this core owns are mapped: the secure non-volatile
//! domain (persistent registers, monotonic counter, periodic tick), the
//! secure-domain GPIO bank, the hardware watchdog, the inter-core software
//! interrupt and the temperature monitor. Everything else on the SoC belongs
//! to the application core.

#![no_std]

pub mod debounce;
pub mod gpio;
pub mod intercore;
pub mod lpuart;
pub mod snvs;
pub mod tempmon;
pub mod wdog;

/// NVIC vector numbers of the interrupt lines this core services, from the
/// SoC reference manual.
pub mod irq {
    /// Inter-core software interrupt (general-purpose register IRQ).
    pub const INTER_CORE: u32 = 41;
    /// Shared secure-domain interrupt carrying the periodic tick.
    pub const SNVS_HP_NON_TZ: u32 = 45;
    /// Secure-domain GPIO bank, pins 0..=31 combined.
    pub const GPIO13_COMBINED_0_31: u32 = 93;
    /// Hardware watchdog pre-timeout.
    pub const WDOG1: u32 = 112;
}
