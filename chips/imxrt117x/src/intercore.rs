// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Inter-core software interrupt.
//!
//! The two cores share one software interrupt, edge-generated by toggling
//! the GINT bit in an IOMUXC general-purpose register. Raising it consists
//! of a clear-set-clear pulse wrapped in a data-synchronization barrier so
//! the peer observes every prior shared-memory write before its handler
//! runs.

use cortexm4::nvic::Nvic;
use cortexm4::support;
use kernel::hil::intercore::InterCoreSignal;
use kernel::hil::sync::MemoryBarriers;
use kernel::utilities::registers::interfaces::ReadWriteable;
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    IomuxcGprRegisters {
        (0x00 => _reserved0),
        /// GPR7 carries the software-interrupt bit towards the peer core.
        (0x1c => gpr7: ReadWrite<u32, Gpr7::Register>),
        (0x20 => @END),
    }
}

register_bitfields![u32,
    Gpr7 [
        /// General interrupt towards the peer core, edge generated.
        GINT OFFSET(0) NUMBITS(1)
    ]
];

const IOMUXC_GPR_BASE: StaticRef<IomuxcGprRegisters> =
    unsafe { StaticRef::new(0x400E_4000 as *const IomuxcGprRegisters) };

pub struct InterCore {
    registers: StaticRef<IomuxcGprRegisters>,
    nvic: Nvic,
}

impl InterCore {
    pub const fn new() -> InterCore {
        InterCore {
            registers: IOMUXC_GPR_BASE,
            nvic: unsafe { Nvic::new(crate::irq::INTER_CORE) },
        }
    }
}

impl InterCoreSignal for InterCore {
    fn trigger(&self) {
        // All shared-memory writes must be visible before the pulse.
        support::dsb();
        self.registers.gpr7.modify(Gpr7::GINT::CLEAR);
        self.registers.gpr7.modify(Gpr7::GINT::SET);
        self.registers.gpr7.modify(Gpr7::GINT::CLEAR);
        // The local pending bit is NOT cleared here: the peer may have sent
        // a message of its own in the meantime.
    }

    fn disable(&self) {
        self.nvic.disable();
        // Keep a pending handler from running after the disabling
        // instruction retires.
        support::dsb();
        support::isb();
    }

    fn enable(&self) {
        self.nvic.enable();
        support::dsb();
        support::isb();
    }
}

impl MemoryBarriers for InterCore {
    fn data_memory_barrier(&self) {
        support::dmb();
    }

    fn data_synchronization_barrier(&self) {
        support::dsb();
    }
}
