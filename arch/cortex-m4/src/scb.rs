// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! ARM System Control Block.
//!
//! Only the registers this firmware actually touches are mapped: the reset
//! request, the priority-group configuration and the SysTick priority byte.

use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    ScbRegisters {
        (0x00 => _reserved0),
        /// Application Interrupt and Reset Control Register
        (0x0c => aircr: ReadWrite<u32, ApplicationInterruptAndReset::Register>),
        (0x10 => _reserved1),
        /// System Handler Priority Register 3 (SysTick, PendSV)
        (0x20 => shpr3: ReadWrite<u32, SystemHandlerPriority3::Register>),
        (0x24 => @END),
    }
}

register_bitfields![u32,
    ApplicationInterruptAndReset [
        /// Key that must read 0xFA05 and be written 0x05FA.
        VECTKEY         OFFSET(16)  NUMBITS(16),

        /// Data endianness bit.
        ENDIANNESS      OFFSET(15)  NUMBITS(1),

        /// Interrupt priority grouping field.
        PRIGROUP        OFFSET(8)   NUMBITS(3),

        /// System reset request.
        SYSRESETREQ     OFFSET(2)   NUMBITS(1)
    ],

    SystemHandlerPriority3 [
        /// Priority of the SysTick exception.
        PRI_15          OFFSET(24)  NUMBITS(8),

        /// Priority of the PendSV exception.
        PRI_14          OFFSET(16)  NUMBITS(8)
    ]
];

const AIRCR_VECTKEY: u32 = 0x05FA;

const SCB: StaticRef<ScbRegisters> =
    unsafe { StaticRef::new(0xE000_ED00 as *const ScbRegisters) };

/// Request a system reset through the SCB.
///
/// The write is asynchronous; callers spin afterwards.
pub unsafe fn reset() {
    let prigroup = SCB.aircr.read(ApplicationInterruptAndReset::PRIGROUP);
    SCB.aircr.write(
        ApplicationInterruptAndReset::VECTKEY.val(AIRCR_VECTKEY)
            + ApplicationInterruptAndReset::PRIGROUP.val(prigroup)
            + ApplicationInterruptAndReset::SYSRESETREQ::SET,
    );
}

/// Configure the interrupt priority grouping.
///
/// A group value of 7 assigns all priority bits to the subpriority field, so
/// no interrupt ever preempts another; pending interrupts are merely ordered.
/// The whole concurrency argument of the supervisory core rests on this
/// setting.
pub unsafe fn set_priority_grouping(group: u32) {
    SCB.aircr.write(
        ApplicationInterruptAndReset::VECTKEY.val(AIRCR_VECTKEY)
            + ApplicationInterruptAndReset::PRIGROUP.val(group & 0x7),
    );
}

/// Set the SysTick exception priority (SysTick is an exception, not an NVIC
/// line, but shares the 8-bit priority encoding).
pub unsafe fn set_systick_priority(priority: u8) {
    SCB.shpr3
        .modify(SystemHandlerPriority3::PRI_15.val(priority as u32));
}
