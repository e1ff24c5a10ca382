// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! LPUART, transmit only.
//!
//! Debug output is the only UART use this core has. Pin muxing, clocking
//! and the baud divider are inherited from the bootloader's console setup;
//! this driver just makes sure the transmitter is on and pushes bytes.

use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    LpuartRegisters {
        /// Version ID
        (0x00 => verid: ReadOnly<u32>),
        /// Parameter
        (0x04 => param: ReadOnly<u32>),
        /// Global control
        (0x08 => global: ReadWrite<u32>),
        /// Pin configuration
        (0x0c => pincfg: ReadWrite<u32>),
        /// Baud rate
        (0x10 => baud: ReadWrite<u32>),
        /// Status
        (0x14 => stat: ReadWrite<u32, Status::Register>),
        /// Control
        (0x18 => ctrl: ReadWrite<u32, Control::Register>),
        /// Data
        (0x1c => data: ReadWrite<u32>),
        (0x20 => @END),
    }
}

register_bitfields![u32,
    Status [
        /// Transmit data register empty.
        TDRE OFFSET(23) NUMBITS(1),
        /// Transmission complete.
        TC   OFFSET(22) NUMBITS(1)
    ],

    Control [
        /// Transmitter enable.
        TE OFFSET(19) NUMBITS(1),
        /// Receiver enable.
        RE OFFSET(18) NUMBITS(1)
    ]
];

const LPUART1_BASE: StaticRef<LpuartRegisters> =
    unsafe { StaticRef::new(0x4007_C000 as *const LpuartRegisters) };

pub struct Lpuart {
    registers: StaticRef<LpuartRegisters>,
}

impl Lpuart {
    pub const fn new_lpuart1() -> Lpuart {
        Lpuart {
            registers: LPUART1_BASE,
        }
    }

    /// Make sure the transmitter is enabled.
    pub fn enable_tx(&self) {
        self.registers.ctrl.modify(Control::TE::SET);
    }

    /// Blocking single-byte transmit.
    pub fn send_byte(&self, byte: u8) {
        while !self.registers.stat.is_set(Status::TDRE) {}
        self.registers.data.set(byte as u32);
    }

    /// Wait for the shift register to drain.
    pub fn flush(&self) {
        while !self.registers.stat.is_set(Status::TC) {}
    }
}
