// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Board configuration: watchdog timeouts, tick rates and the memory-write
//! policy tables.
//!
//! Everything here is compile-time constant; the assertions at the bottom
//! turn configuration mistakes into build failures.

use capsules_resilience::soft_mpu::AccessPolicy::{Allow, Deny};
use capsules_resilience::soft_mpu::MpuEntry;
use capsules_resilience::supervisor::Config;
use kernel::hil::gpio::SupervisedPin;

/// Supervisory tick frequency exponent: the periodic interrupt runs at
/// 2^(15 - (15 - EXP)) = 2^EXP Hz.
pub const TICK_FREQUENCY_EXP: u32 = 10;
/// Tick frequency of the functional and authenticated watchdogs: 1024 Hz.
pub const TICK_FREQUENCY_HZ: u32 = 1 << TICK_FREQUENCY_EXP;

/// Number of functional watchdogs offered to the application core.
pub const FWDG_COUNT: usize = 1;
/// Per-watchdog timeouts.
pub const FWDG_TIMEOUTS_MS: [u32; FWDG_COUNT] = [24 * 3600 * 1000];
/// Shared functional grace period.
pub const FWDG_GRACE_MS: u32 = 5000;

/// Timeout the authenticated watchdog starts with when no countdown
/// survived.
pub const AWDG_INITIAL_TIMEOUT_MS: u32 = 24 * 3600 * 1000;
/// Authenticated grace period.
pub const AWDG_GRACE_MS: u32 = 5000;

/// Hardware watchdog: resets after (WT + 1) * 0.5 s = 1 s.
pub const HW_WDG_TIMEOUT: u16 = 1;
/// Pre-timeout interrupt fires WICT * 0.5 s = 0.5 s before the reset.
pub const HW_WDG_PRETIMEOUT: u16 = 1;

/// Supervisory ticks between hardware-watchdog kicks. Sized so the kick
/// lands before the pre-timeout interrupt would fire, with 5 ms kept as
/// buffer for other interrupts and processing-time noise.
pub const TICKS_UNTIL_HWDG_KICK: u32 =
    (500 * (HW_WDG_TIMEOUT as u32 + 1 - HW_WDG_PRETIMEOUT as u32) - 5) * TICK_FREQUENCY_HZ
        / 1000;

/// Systick (debounce) period.
pub const SYSTICK_PERIOD_MS: u32 = 10;
/// Ticks an input must stay quiet before its level is accepted; the
/// realized debounce time is at least (reload - 1) systick periods.
pub const DEBOUNCE_RELOAD: i8 = 2;

/// The CM4 root clock, as configured by the bootloader.
pub const CORE_CLOCK_HZ: u32 = 240_000_000;

/// Output state driven at boot: both SPI selects deasserted high, user
/// outputs low.
pub const INITIAL_OUTPUTS: u32 =
    SupervisedPin::SpiSelect0.mask() | SupervisedPin::SpiSelect1.mask();

// Guarded memory-write policy. The application core may tune the clock
// controller and analog blocks, except for everything feeding this core's
// own clock, power and reset domains.

const CCM_BASE: usize = 0x40CC_0000;
const CCM_SIZE: usize = 32 * 1024;
const ANADIG_BASE: usize = 0x40C8_4000;
const ANADIG_SIZE: usize = 16 * 1024;

/// Address windows the memory-write service considers at all.
pub const MEM_WRITE_WINDOWS: &[(usize, usize)] =
    &[(CCM_BASE, CCM_SIZE), (ANADIG_BASE, ANADIG_SIZE)];

/// Allow/deny table for writes inside the windows. Highest index wins.
pub const MEM_WRITE_POLICY: &[MpuEntry] = &[
    // Clock controller: allowed except for the punch-outs below.
    MpuEntry::from_base_size(CCM_BASE, CCM_SIZE, Allow),
    // Clock source 0 (OSC_RC_16M): CCM, DCDC, GPC, SSARC.
    MpuEntry::from_base_size(CCM_BASE + 0x5000, 0x20, Deny),
    // Clock source 2 (OSC_RC_48M_DIV2): supervisory systick.
    MpuEntry::from_base_size(CCM_BASE + 0x5040, 0x20, Deny),
    // Clock sources 4, 5 (OSC_24M): PLL references.
    MpuEntry::from_base_size(CCM_BASE + 0x5080, 0x40, Deny),
    // Clock sources 14, 15 (SYS_PLL3): this core's and both bus clocks.
    MpuEntry::from_base_size(CCM_BASE + 0x51C0, 0x40, Deny),
    // Clock source 20 (SYS_PLL3_PFD3): this core's clock.
    MpuEntry::from_base_size(CCM_BASE + 0x5280, 0x20, Deny),
    // Clock roots 1..=3 (this core, both buses).
    MpuEntry::from_base_size(CCM_BASE + 0x80, 0x180, Deny),
    // Clock root 7 (supervisory systick).
    MpuEntry::from_base_size(CCM_BASE + 0x380, 0x80, Deny),
    // Clock gate 1: this core.
    MpuEntry::from_base_size(CCM_BASE + 0x6020, 0x20, Deny),
    // Clock gates 5..=12: AIPS bridges, ANADIG, DCDC, SRC, CCM, GPC, SSARC.
    MpuEntry::from_base_size(CCM_BASE + 0x60A0, 0x100, Deny),
    // Clock gate 14: the hardware watchdog.
    MpuEntry::from_base_size(CCM_BASE + 0x61C0, 0x20, Deny),
    // Clock gate 27: this core's local memories.
    MpuEntry::from_base_size(CCM_BASE + 0x6360, 0x20, Deny),
    // Clock gate 30: the resource domain controller.
    MpuEntry::from_base_size(CCM_BASE + 0x63C0, 0x20, Deny),
    // Clock gates 38, 39: the secure non-volatile domain.
    MpuEntry::from_base_size(CCM_BASE + 0x64C0, 0x40, Deny),
    // Analog block: allowed except for the punch-outs below.
    MpuEntry::from_base_size(ANADIG_BASE, ANADIG_SIZE, Allow),
    // Oscillator control (48M, 24M, 16M).
    MpuEntry::from_base_size(ANADIG_BASE + 0x10, 0x14, Deny),
    MpuEntry::from_base_size(ANADIG_BASE + 0xC0, 0x4, Deny),
    // SYS_PLL3 control: this core's and both bus clock roots.
    MpuEntry::from_base_size(ANADIG_BASE + 0x210, 0x24, Deny),
    // Power-management unit.
    MpuEntry::from_base_size(ANADIG_BASE + 0x500, 0x2D4, Deny),
    MpuEntry::from_base_size(ANADIG_BASE + 0x3C00, 0x254, Deny),
];

/// The supervisor's view of this configuration.
pub const fn supervisor_config() -> Config<FWDG_COUNT> {
    Config {
        tick_frequency_hz: TICK_FREQUENCY_HZ,
        functional_grace_ms: FWDG_GRACE_MS,
        functional_timeouts_ms: FWDG_TIMEOUTS_MS,
        awdg_initial_timeout_ms: AWDG_INITIAL_TIMEOUT_MS,
        awdg_grace_ms: AWDG_GRACE_MS,
        hardware_watchdog_kick_reload: TICKS_UNTIL_HWDG_KICK,
        mem_write_windows: MEM_WRITE_WINDOWS,
        mem_write_policy: MEM_WRITE_POLICY,
    }
}

// The tick budget for servicing the hardware watchdog must be strictly
// positive, and the configuration must leave the pre-timeout interrupt
// inside the timeout.
const _: () = assert!(TICKS_UNTIL_HWDG_KICK > 0);
const _: () = assert!(HW_WDG_PRETIMEOUT <= HW_WDG_TIMEOUT);
// Timeouts of at least 7 days must stay representable in ticks.
const _: () = assert!(TICK_FREQUENCY_HZ as u64 * 604_800_000 < (u32::MAX as u64) * 1000);
// Member ids travel as single bytes.
const _: () = assert!(FWDG_COUNT >= 1 && FWDG_COUNT <= 255);
// The periodic-interrupt divider only has 4 bits of range.
const _: () = assert!(TICK_FREQUENCY_EXP <= 15);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_watchdog_kick_budget_leaves_margin() {
        // One kick interval, in ms, must fit inside the pre-timeout window.
        let kick_interval_ms = TICKS_UNTIL_HWDG_KICK as u64 * 1000 / TICK_FREQUENCY_HZ as u64;
        let pretimeout_window_ms =
            500 * (HW_WDG_TIMEOUT as u64 + 1 - HW_WDG_PRETIMEOUT as u64);
        assert!(kick_interval_ms < pretimeout_window_ms);
        assert!(pretimeout_window_ms - kick_interval_ms >= 5);
    }

    #[test]
    fn policy_windows_cover_the_tables() {
        // Every policy entry must fall inside one of the pre-check windows,
        // otherwise it could never match.
        for &(base, size) in MEM_WRITE_WINDOWS {
            assert!(size > 0);
            assert!(base.checked_add(size - 1).is_some());
        }
    }
}
