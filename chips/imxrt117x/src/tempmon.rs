// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! On-die temperature sensor.
//!
//! One-shot measurements only; the alarm comparators and their interrupts
//! stay disabled, the application core owns thermal management policy.

use kernel::hil::temperature::TemperatureSensor;
use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    TempmonRegisters {
        /// Control register 0 with set/clear/toggle views
        (0x00 => ctrl0: ReadWrite<u32, Ctrl0::Register>),
        (0x04 => ctrl0_set: ReadWrite<u32, Ctrl0::Register>),
        (0x08 => ctrl0_clr: ReadWrite<u32, Ctrl0::Register>),
        (0x0c => ctrl0_tog: ReadWrite<u32, Ctrl0::Register>),
        /// Control register 1 with set/clear/toggle views
        (0x10 => ctrl1: ReadWrite<u32, Ctrl1::Register>),
        (0x14 => ctrl1_set: ReadWrite<u32, Ctrl1::Register>),
        (0x18 => ctrl1_clr: ReadWrite<u32, Ctrl1::Register>),
        (0x1c => ctrl1_tog: ReadWrite<u32, Ctrl1::Register>),
        (0x20 => _reserved0),
        /// Status register with the measured value
        (0x30 => status0: ReadWrite<u32, Status0::Register>),
        (0x34 => @END),
    }
}

register_bitfields![u32,
    Ctrl0 [
        /// Power down the sensor.
        PWD             OFFSET(31) NUMBITS(1),
        /// Single measurement trigger.
        SINGLE_MODE     OFFSET(0)  NUMBITS(1)
    ],

    Ctrl1 [
        /// Start a measurement cycle.
        START           OFFSET(31) NUMBITS(1),
        /// Finish-of-measurement interrupt enable.
        FINISH_IE       OFFSET(10) NUMBITS(1),
        /// Low-temperature alarm interrupt enable.
        LOW_TEMP_IE     OFFSET(9)  NUMBITS(1),
        /// High-temperature alarm interrupt enable.
        HIGH_TEMP_IE    OFFSET(8)  NUMBITS(1),
        /// Panic-temperature alarm interrupt enable.
        PANIC_TEMP_IE   OFFSET(7)  NUMBITS(1)
    ],

    Status0 [
        /// Measurement complete.
        FINISH          OFFSET(16) NUMBITS(1),
        /// Measured temperature, two's complement, 4 fractional bits.
        TEMP_VAL        OFFSET(0)  NUMBITS(12)
    ]
];

const TEMPMON_BASE: StaticRef<TempmonRegisters> =
    unsafe { StaticRef::new(0x40C8_C000 as *const TempmonRegisters) };

pub struct Tempmon {
    registers: StaticRef<TempmonRegisters>,
}

impl Tempmon {
    pub const fn new() -> Tempmon {
        Tempmon {
            registers: TEMPMON_BASE,
        }
    }

    /// Power the sensor up in single-shot mode with every alarm interrupt
    /// masked.
    pub fn init(&self) {
        let regs = self.registers;
        regs.ctrl0_clr.write(Ctrl0::PWD::SET);
        regs.ctrl0_set.write(Ctrl0::SINGLE_MODE::SET);
        regs.ctrl1_clr.write(
            Ctrl1::FINISH_IE::SET
                + Ctrl1::LOW_TEMP_IE::SET
                + Ctrl1::HIGH_TEMP_IE::SET
                + Ctrl1::PANIC_TEMP_IE::SET,
        );
    }
}

impl TemperatureSensor for Tempmon {
    fn celsius(&self) -> f32 {
        let regs = self.registers;

        regs.ctrl1_set.write(Ctrl1::START::SET);
        while !regs.status0.is_set(Status0::FINISH) {}

        let raw = regs.status0.read(Status0::TEMP_VAL);
        regs.ctrl1_clr.write(Ctrl1::START::SET);

        // Sign-extend the 12-bit value, 4 fractional bits.
        let signed = ((raw as i32) << 20) >> 20;
        signed as f32 / 16.0
    }
}
