// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! A managed group of logical watchdogs sharing one grace-period watchdog
//! and one tick frequency.
//!
//! When any member expires, the grace watchdog starts; while it runs, the
//! members are no longer ticked (a reset is pending anyway). When the grace
//! watchdog expires, the caller must commit state and reset the system; the
//! unit stays in that terminal state until re-created.
//!
//! Timing: a member's last kick can land anywhere inside a tick interval,
//! which then counts as served, and the ms→ticks conversion rounds up. The
//! realized timeout is therefore within [chosen, chosen + 2 tick periods].
//!
//! Concurrency is the caller's: the unit has no internal locking, same as
//! its members.

use core::cell::Cell;
use kernel::ErrorCode;

use crate::lwdg::{KickOutcome, LogicalWatchdog, TickOutcome};

/// Outcome of ticking the whole unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitTickOutcome {
    /// No member expired on this tick; the grace watchdog is not running.
    Idle,
    /// A member expired on this tick and the grace watchdog just started.
    GraceStarted,
    /// The grace watchdog is counting down towards the reset.
    GraceRunning,
    /// The grace period is over: commit state and reset the system.
    GraceExpired,
    /// Ticked again after the grace period expired (the reset did not
    /// happen). Terminal.
    GracePreviouslyExpired,
}

/// Largest supported member count; member ids are exchanged as single
/// bytes.
pub const MAX_MEMBERS: usize = 255;

/// Convert a timeout in ms to ticks of the given frequency, rounding up.
///
/// Performed in u64: `hz * ms + 999` fits for any pair of u32 inputs. Fails
/// if the tick count does not fit a u32 or the frequency is zero.
pub fn ms_to_ticks(timeout_ms: u32, tick_frequency_hz: u32) -> Result<u32, ErrorCode> {
    if tick_frequency_hz == 0 {
        return Err(ErrorCode::InvalidArgument);
    }
    let ticks = (tick_frequency_hz as u64 * timeout_ms as u64 + 999) / 1000;
    if ticks > u32::MAX as u64 {
        return Err(ErrorCode::InvalidArgument);
    }
    Ok(ticks as u32)
}

pub struct WatchdogUnit<const N: usize> {
    grace: LogicalWatchdog,
    members: [LogicalWatchdog; N],
    tick_frequency_hz: u32,
    /// Index of the first member whose expiry started the grace watchdog.
    grace_triggered_by: Cell<Option<u8>>,
}

impl<const N: usize> WatchdogUnit<N> {
    const MEMBER: LogicalWatchdog = LogicalWatchdog::new();

    /// Create a unit whose members all carry the fail-loud zero reload (a
    /// kicked but never configured member expires at its next tick).
    /// Members get their real timeouts via [`WatchdogUnit::init_member`].
    pub fn new(grace_timeout_ms: u32, tick_frequency_hz: u32) -> Result<WatchdogUnit<N>, ErrorCode> {
        if N == 0 || N > MAX_MEMBERS {
            return Err(ErrorCode::InvalidArgument);
        }
        let grace_ticks = ms_to_ticks(grace_timeout_ms, tick_frequency_hz)?;
        let unit = WatchdogUnit {
            grace: LogicalWatchdog::new(),
            members: [Self::MEMBER; N],
            tick_frequency_hz,
            grace_triggered_by: Cell::new(None),
        };
        unit.grace.init(grace_ticks)?;
        Ok(unit)
    }

    fn member(&self, id: u8) -> Result<&LogicalWatchdog, ErrorCode> {
        self.members
            .get(id as usize)
            .ok_or(ErrorCode::InvalidArgument)
    }

    /// Configure one member's timeout. Takes effect at its next kick.
    pub fn init_member(&self, id: u8, timeout_ms: u32) -> Result<(), ErrorCode> {
        let ticks = ms_to_ticks(timeout_ms, self.tick_frequency_hz)?;
        self.member(id)?.init(ticks)
    }

    /// Advance the unit by one tick interval.
    ///
    /// While the grace watchdog runs only it is ticked. Otherwise members
    /// are ticked in index order; the first expiry records its index,
    /// starts the grace watchdog and stops the sweep.
    pub fn tick(&self) -> UnitTickOutcome {
        match self.grace.tick() {
            TickOutcome::Running => return UnitTickOutcome::GraceRunning,
            TickOutcome::JustExpired => return UnitTickOutcome::GraceExpired,
            TickOutcome::PreviouslyExpired => return UnitTickOutcome::GracePreviouslyExpired,
            TickOutcome::NotRunning => {}
        }

        for (id, member) in self.members.iter().enumerate() {
            if member.tick() == TickOutcome::JustExpired {
                self.grace_triggered_by.set(Some(id as u8));
                return self.start_grace();
            }
        }
        UnitTickOutcome::Idle
    }

    /// Start the grace watchdog with the kick-then-tick pattern: the kick
    /// counts the current interval as served, which is wrong for a grace
    /// period nobody can serve, so one tick immediately takes it back. This
    /// also makes a grace of zero expire right here.
    fn start_grace(&self) -> UnitTickOutcome {
        self.grace.kick();
        match self.grace.tick() {
            TickOutcome::Running => UnitTickOutcome::GraceStarted,
            TickOutcome::JustExpired => UnitTickOutcome::GraceExpired,
            // A freshly kicked watchdog can only be running or just
            // expired.
            _ => UnitTickOutcome::GraceExpired,
        }
    }

    pub fn kick(&self, id: u8) -> Result<KickOutcome, ErrorCode> {
        Ok(self.member(id)?.kick())
    }

    pub fn is_running(&self, id: u8) -> Result<bool, ErrorCode> {
        Ok(self.member(id)?.is_running())
    }

    pub fn remaining_ticks(&self, id: u8) -> Result<u32, ErrorCode> {
        Ok(self.member(id)?.remaining_ticks())
    }

    pub fn change_timeout_ticks(&self, id: u8, reload_ticks: u32) -> Result<(), ErrorCode> {
        self.member(id)?.change_timeout_ticks(reload_ticks)
    }

    pub fn change_timeout_ms(&self, id: u8, timeout_ms: u32) -> Result<(), ErrorCode> {
        let ticks = ms_to_ticks(timeout_ms, self.tick_frequency_hz)?;
        self.member(id)?.change_timeout_ticks(ticks)
    }

    /// Index of the member whose expiry started the grace watchdog, if any.
    pub fn grace_triggered_by(&self) -> Option<u8> {
        self.grace_triggered_by.get()
    }

    pub fn tick_frequency_hz(&self) -> u32 {
        self.tick_frequency_hz
    }
}
