// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Cortex-M4 NVIC.
//!
//! <https://developer.arm.com/docs/100166/0001/nested-vectored-interrupt-controller>

use kernel::utilities::registers::interfaces::Writeable;
use kernel::utilities::registers::{register_structs, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    NvicRegisters {
        (0x000 => _reserved0),
        /// Interrupt Set-Enable Registers
        (0x100 => iser: [ReadWrite<u32>; 8]),
        (0x120 => _reserved1),
        /// Interrupt Clear-Enable Registers
        (0x180 => icer: [ReadWrite<u32>; 8]),
        (0x1a0 => _reserved2),
        /// Interrupt Set-Pending Registers
        (0x200 => ispr: [ReadWrite<u32>; 8]),
        (0x220 => _reserved3),
        /// Interrupt Clear-Pending Registers
        (0x280 => icpr: [ReadWrite<u32>; 8]),
        (0x2a0 => _reserved4),
        /// Interrupt Priority Registers, byte accessible
        (0x400 => ipr: [ReadWrite<u8>; 240]),
        (0x4f0 => @END),
    }
}

const NVIC: StaticRef<NvicRegisters> =
    unsafe { StaticRef::new(0xE000_E000 as *const NvicRegisters) };

/// An opaque handle for a single NVIC interrupt line.
///
/// Handed out by the chip crate so each driver controls its own line and no
/// other.
pub struct Nvic(u32);

impl Nvic {
    /// Creates a new `Nvic` handle.
    ///
    /// Marked unsafe because only chip configuration code should mint these.
    pub const unsafe fn new(idx: u32) -> Nvic {
        Nvic(idx)
    }

    /// Enable the interrupt.
    pub fn enable(&self) {
        let idx = self.0 as usize;
        NVIC.iser[idx / 32].set(1 << (self.0 & 31));
    }

    /// Disable the interrupt.
    pub fn disable(&self) {
        let idx = self.0 as usize;
        NVIC.icer[idx / 32].set(1 << (self.0 & 31));
    }

    /// Clear pending state.
    pub fn clear_pending(&self) {
        let idx = self.0 as usize;
        NVIC.icpr[idx / 32].set(1 << (self.0 & 31));
    }

    /// Set the 8-bit priority of this line.
    ///
    /// With priority grouping fixed to subpriority-only this orders pending
    /// interrupts without ever enabling preemption.
    pub fn set_priority(&self, priority: u8) {
        NVIC.ipr[self.0 as usize].set(priority);
    }
}
