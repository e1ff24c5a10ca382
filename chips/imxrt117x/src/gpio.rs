// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Secure-domain GPIO bank (GPIO13).
//!
//! Carries the four user inputs, the four user outputs and the two
//! SPI-select outputs. Inputs are sensed on either edge and debounced in
//! software (see [`crate::debounce`]); outputs are driven from the mirror
//! layer above.

use crate::debounce::Debouncer;
use kernel::hil::gpio::{SupervisedPins, INPUT_MASK, OUTPUT_MASK};
use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{register_structs, ReadOnly, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    GpioRegisters {
        /// Data register
        (0x00 => dr: ReadWrite<u32>),
        /// Direction register, 1 = output
        (0x04 => gdir: ReadWrite<u32>),
        /// Pad status register
        (0x08 => psr: ReadOnly<u32>),
        /// Interrupt configuration registers (2 bits per pin)
        (0x0c => icr1: ReadWrite<u32>),
        (0x10 => icr2: ReadWrite<u32>),
        /// Interrupt mask register
        (0x14 => imr: ReadWrite<u32>),
        /// Interrupt status register, write 1 to clear
        (0x18 => isr: ReadWrite<u32>),
        /// Edge select: 1 = interrupt on any edge, overrides ICR
        (0x1c => edge_sel: ReadWrite<u32>),
        (0x20 => _reserved0),
        /// Atomic data set / clear / toggle
        (0x84 => dr_set: ReadWrite<u32>),
        (0x88 => dr_clear: ReadWrite<u32>),
        (0x8c => dr_toggle: ReadWrite<u32>),
        (0x90 => @END),
    }
}

const GPIO13_BASE: StaticRef<GpioRegisters> =
    unsafe { StaticRef::new(0x40C7_0000 as *const GpioRegisters) };

/// Pins tracked by the debouncer (one bank).
const DEBOUNCED_PINS: usize = 16;

pub struct SupervisedIo {
    registers: StaticRef<GpioRegisters>,
    debounce: Debouncer<DEBOUNCED_PINS>,
}

impl SupervisedIo {
    pub const fn new(debounce_reload: i8) -> SupervisedIo {
        SupervisedIo {
            registers: GPIO13_BASE,
            debounce: Debouncer::new(debounce_reload),
        }
    }

    /// Configure directions, drive the initial output state, seed the
    /// debouncer from the raw bank and enable the pin-change interrupt at
    /// the peripheral (the NVIC line stays masked until the board unmasks
    /// it).
    pub fn init(&self, initial_outputs: u32) {
        let regs = self.registers;

        regs.gdir.set(OUTPUT_MASK);
        regs.dr.set(initial_outputs & OUTPUT_MASK);

        // Inputs interrupt on both edges.
        regs.edge_sel.set(INPUT_MASK);

        self.debounce.seed(regs.dr.get() & INPUT_MASK);

        // Drop anything pending from before configuration, then unmask.
        regs.isr.set(0xFFFF_FFFF);
        regs.imr.set(INPUT_MASK);
    }

    /// Edge-interrupt handler: arm debounce countdowns for the pins that
    /// fired and acknowledge them.
    pub fn handle_interrupt(&self) {
        let regs = self.registers;
        let fired = regs.isr.get() & INPUT_MASK;
        self.debounce.edge(fired);
        regs.isr.set(fired);
    }

    /// Periodic (10 ms) tick handler: advance the debounce countdowns
    /// against the current raw levels.
    pub fn handle_tick(&self) {
        let raw = self.registers.dr.get() & INPUT_MASK;
        self.debounce.tick(raw);
    }
}

impl SupervisedPins for SupervisedIo {
    fn set_outputs(&self, bitmap: u32) {
        self.registers.dr.set(bitmap & OUTPUT_MASK);
    }

    fn outputs(&self) -> u32 {
        self.registers.dr.get() & OUTPUT_MASK
    }

    fn debounced_inputs(&self) -> u32 {
        self.debounce.state() & INPUT_MASK
    }
}
