// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! WDOG hardware watchdog.
//!
//! Last line of defense: if the supervisory tick stops servicing it, the
//! pre-timeout interrupt fires first (giving the bailout handler a chance
//! to persist state) and the hardware reset follows half a second later.
//! Timeout granularity is 0.5 s: the counter resets after (WT + 1) * 0.5 s
//! and the interrupt fires WICT * 0.5 s before that.

use core::cell::Cell;
use kernel::hil::watchdog::HardwareWatchdog;
use kernel::utilities::registers::interfaces::{ReadWriteable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    WdogRegisters {
        /// Watchdog Control Register
        (0x000 => wcr: ReadWrite<u16, WCR::Register>),
        /// Watchdog Service Register
        (0x002 => wsr: ReadWrite<u16, WSR::Register>),
        /// Watchdog Reset Status Register
        (0x004 => wrsr: ReadOnly<u16, WRSR::Register>),
        /// Watchdog Interrupt Control Register
        (0x006 => wicr: ReadWrite<u16, WICR::Register>),
        /// Watchdog Miscellaneous Control Register
        (0x008 => wmcr: ReadWrite<u16, WMCR::Register>),
        (0x00a => @END),
    }
}

register_bitfields![u16,
    WCR [
        /// Watchdog time-out field, (WT + 1) * 0.5s.
        WT OFFSET(8) NUMBITS(8) [],
        /// Disable for wait mode.
        WDW OFFSET(7) NUMBITS(1) [],
        /// Software reset extension.
        SRE OFFSET(6) NUMBITS(1) [],
        /// WDOG_B assertion.
        WDA OFFSET(5) NUMBITS(1) [],
        /// Software reset signal.
        SRS OFFSET(4) NUMBITS(1) [],
        /// WDOG_B time-out assertion.
        WDT OFFSET(3) NUMBITS(1) [],
        /// Watchdog enable. Once set it can only be cleared by a reset.
        WDE OFFSET(2) NUMBITS(1) [],
        /// Suspend while the core is halted by a debugger.
        WDBG OFFSET(1) NUMBITS(1) [],
        /// Suspend in low-power modes.
        WDZST OFFSET(0) NUMBITS(1) []
    ],

    WSR [
        /// Service sequence register.
        WSR OFFSET(0) NUMBITS(16) [
            KEY1 = 0x5555,
            KEY2 = 0xAAAA,
        ]
    ],

    WRSR [
        /// Power-on reset.
        POR OFFSET(4) NUMBITS(1) [],
        /// Reset was a watchdog time-out.
        TOUT OFFSET(1) NUMBITS(1) [],
        /// Reset was a software reset.
        SFTW OFFSET(0) NUMBITS(1) []
    ],

    WICR [
        /// Interrupt enable.
        WIE OFFSET(15) NUMBITS(1) [],
        /// Interrupt status, write 1 to clear.
        WTIS OFFSET(14) NUMBITS(1) [],
        /// Interrupt fires WICT * 0.5s before the time-out.
        WICT OFFSET(0) NUMBITS(8) []
    ],

    WMCR [
        /// Power-down enable; must be cleared within 16s of reset.
        PDE OFFSET(0) NUMBITS(1) []
    ]
];

const WDOG1_BASE: StaticRef<WdogRegisters> =
    unsafe { StaticRef::new(0x4003_0000 as *const WdogRegisters) };

pub struct Wdog {
    registers: StaticRef<WdogRegisters>,
    timeout_half_seconds: Cell<u16>,
    pretimeout_half_seconds: Cell<u16>,
}

impl Wdog {
    /// `timeout`: WT field value, resets after (WT + 1) * 0.5 s.
    /// `pretimeout`: WICT field value, interrupt WICT * 0.5 s earlier.
    pub const fn new(timeout: u16, pretimeout: u16) -> Wdog {
        Wdog {
            registers: WDOG1_BASE,
            timeout_half_seconds: Cell::new(timeout),
            pretimeout_half_seconds: Cell::new(pretimeout),
        }
    }
}

impl HardwareWatchdog for Wdog {
    fn start(&self) {
        let regs = self.registers;

        regs.wmcr.modify(WMCR::PDE::CLEAR);
        regs.wicr.write(
            WICR::WIE::SET + WICR::WICT.val(self.pretimeout_half_seconds.get() & 0xFF),
        );
        // WDBG keeps the counter frozen under a debugger; without it every
        // breakpoint longer than a second reboots the board.
        regs.wcr.write(
            WCR::WT.val(self.timeout_half_seconds.get() & 0xFF)
                + WCR::WDE::SET
                + WCR::WDBG::SET,
        );
    }

    fn kick(&self) {
        self.registers.wsr.write(WSR::WSR::KEY1);
        self.registers.wsr.write(WSR::WSR::KEY2);
    }
}
