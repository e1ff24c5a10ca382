// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! ARM Cortex-M4 SysTick peripheral.
//!
//! Used as a plain fixed-period interrupt source (input debouncing), not as
//! a scheduler timer.

use kernel::utilities::registers::interfaces::Writeable;
use kernel::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    SystickRegisters {
        (0x00 => syst_csr: ReadWrite<u32, ControlAndStatus::Register>),
        (0x04 => syst_rvr: ReadWrite<u32, ReloadValue::Register>),
        (0x08 => syst_cvr: ReadWrite<u32, CurrentValue::Register>),
        (0x0c => syst_calib: ReadOnly<u32, CalibrationValue::Register>),
        (0x10 => @END),
    }
}

register_bitfields![u32,
    ControlAndStatus [
        /// Returns 1 if timer counted to 0 since last time this was read.
        COUNTFLAG 16,

        /// Clock source is (0) External Clock or (1) Processor Clock.
        CLKSOURCE 2,

        /// Set to 1 to enable SysTick exception request.
        TICKINT 1,

        /// Enable the counter (1 == Enabled).
        ENABLE 0
    ],

    ReloadValue [
        RELOAD          OFFSET(0)  NUMBITS(24)
    ],

    CurrentValue [
        /// Reads current value. Write of any value sets to 0.
        CURRENT         OFFSET(0)  NUMBITS(24)
    ],

    CalibrationValue [
        NOREF           OFFSET(31) NUMBITS(1),
        SKEW            OFFSET(30) NUMBITS(1),
        TENMS           OFFSET(0)  NUMBITS(24)
    ]
];

const SYSTICK_BASE: StaticRef<SystickRegisters> =
    unsafe { StaticRef::new(0xE000_E010 as *const SystickRegisters) };

const RELOAD_MAX: u32 = (1 << 24) - 1;

/// Start the SysTick exception with the given period.
///
/// The exception fires immediately after this returns, so the handler must
/// be ready beforehand.
pub unsafe fn start_periodic(core_clock_hz: u32, period_ms: u32) -> Result<(), ErrorCode> {
    if period_ms == 0 || core_clock_hz == 0 {
        return Err(ErrorCode::InvalidArgument);
    }
    let ticks = (core_clock_hz as u64 * period_ms as u64) / 1000;
    if ticks == 0 || (ticks - 1) > RELOAD_MAX as u64 {
        return Err(ErrorCode::OutOfRange);
    }

    // n.b.: the generic user guide suggests setting reload before value
    SYSTICK_BASE
        .syst_rvr
        .write(ReloadValue::RELOAD.val((ticks - 1) as u32));
    SYSTICK_BASE.syst_cvr.set(0);
    SYSTICK_BASE.syst_csr.write(
        ControlAndStatus::TICKINT::SET
            + ControlAndStatus::ENABLE::SET
            + ControlAndStatus::CLKSOURCE::SET,
    );

    Ok(())
}

/// Stop the SysTick counter and exception.
pub unsafe fn stop() {
    SYSTICK_BASE.syst_csr.set(0);
    SYSTICK_BASE.syst_rvr.set(0);
    SYSTICK_BASE.syst_cvr.set(0);
}
