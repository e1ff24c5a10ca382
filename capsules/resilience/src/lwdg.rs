// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! A single logical watchdog: a countdown on top of an external tick
//! source.
//!
//! Building block for [`crate::lwdg_unit`]; not meant to be used on its
//! own. The struct provides no internal locking: the owning tick context
//! (an ISR) and the owning mutator (non-ISR kick/init) must be mutually
//! excluded by the caller.

use core::cell::Cell;
use kernel::ErrorCode;

/// Outcome of ticking a watchdog (or a unit of them).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The watchdog is not running; nothing was counted.
    NotRunning,
    /// The watchdog is running and did not expire on this tick.
    Running,
    /// This tick drove the countdown to zero.
    JustExpired,
    /// The watchdog expired on an earlier tick and stays latched.
    PreviouslyExpired,
}

/// Outcome of kicking a watchdog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KickOutcome {
    /// The kick started a stopped watchdog.
    Started,
    /// The watchdog was already running and was reloaded.
    Kicked,
}

pub struct LogicalWatchdog {
    running: Cell<bool>,
    expired: Cell<bool>,
    ticks_to_timeout: Cell<u32>,
    reload_ticks: Cell<u32>,
}

impl LogicalWatchdog {
    /// A stopped watchdog with a reload of zero: once kicked, it expires at
    /// the very next tick. The fail-loud default for members whose timeout
    /// was never configured.
    pub const fn new() -> LogicalWatchdog {
        LogicalWatchdog {
            running: Cell::new(false),
            expired: Cell::new(false),
            ticks_to_timeout: Cell::new(1),
            reload_ticks: Cell::new(0),
        }
    }

    /// (Re)initialize with the given reload. `u32::MAX` is rejected because
    /// kicks load `reload_ticks + 1`.
    pub fn init(&self, reload_ticks: u32) -> Result<(), ErrorCode> {
        if reload_ticks >= u32::MAX {
            return Err(ErrorCode::InvalidArgument);
        }
        self.running.set(false);
        self.expired.set(false);
        // Value does not matter while stopped; the first kick reloads it.
        self.ticks_to_timeout.set(reload_ticks + 1);
        self.reload_ticks.set(reload_ticks);
        Ok(())
    }

    pub fn tick(&self) -> TickOutcome {
        if !self.running.get() {
            TickOutcome::NotRunning
        } else if self.expired.get() {
            TickOutcome::PreviouslyExpired
        } else {
            // Invariant: running and not expired implies a non-zero count.
            let remaining = self.ticks_to_timeout.get() - 1;
            self.ticks_to_timeout.set(remaining);
            if remaining == 0 {
                self.expired.set(true);
                TickOutcome::JustExpired
            } else {
                TickOutcome::Running
            }
        }
    }

    /// Reload the countdown and start the watchdog if stopped.
    ///
    /// The countdown is set to `reload_ticks + 1` so the tick interval the
    /// kick lands in counts as served; a timeout of N means "at least N
    /// full tick intervals after the kick". An expired watchdog is not
    /// modified.
    pub fn kick(&self) -> KickOutcome {
        if !self.expired.get() {
            self.ticks_to_timeout.set(self.reload_ticks.get() + 1);
        }
        if !self.running.get() {
            self.running.set(true);
            KickOutcome::Started
        } else {
            KickOutcome::Kicked
        }
    }

    /// Change the reload value. Takes effect at the next kick only.
    pub fn change_timeout_ticks(&self, reload_ticks: u32) -> Result<(), ErrorCode> {
        if reload_ticks >= u32::MAX {
            return Err(ErrorCode::InvalidArgument);
        }
        self.reload_ticks.set(reload_ticks);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn remaining_ticks(&self) -> u32 {
        self.ticks_to_timeout.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_timeout_sequence() {
        let dog = LogicalWatchdog::new();
        dog.init(5).unwrap();
        assert_eq!(dog.tick(), TickOutcome::NotRunning);

        assert_eq!(dog.kick(), KickOutcome::Started);
        for _ in 0..5 {
            assert_eq!(dog.tick(), TickOutcome::Running);
        }
        assert_eq!(dog.tick(), TickOutcome::JustExpired);
        assert_eq!(dog.tick(), TickOutcome::PreviouslyExpired);
    }

    #[test]
    fn kick_reloads_running_watchdog() {
        let dog = LogicalWatchdog::new();
        dog.init(2).unwrap();
        dog.kick();
        assert_eq!(dog.tick(), TickOutcome::Running);
        assert_eq!(dog.tick(), TickOutcome::Running);
        assert_eq!(dog.kick(), KickOutcome::Kicked);
        assert_eq!(dog.remaining_ticks(), 3);
        assert_eq!(dog.tick(), TickOutcome::Running);
        assert_eq!(dog.tick(), TickOutcome::Running);
        assert_eq!(dog.tick(), TickOutcome::JustExpired);
    }

    #[test]
    fn expired_watchdog_is_frozen() {
        let dog = LogicalWatchdog::new();
        dog.init(0).unwrap();
        dog.kick();
        assert_eq!(dog.tick(), TickOutcome::JustExpired);

        // Neither kick nor tick move the countdown once expired.
        assert_eq!(dog.kick(), KickOutcome::Kicked);
        assert_eq!(dog.remaining_ticks(), 0);
        assert_eq!(dog.tick(), TickOutcome::PreviouslyExpired);
        assert_eq!(dog.remaining_ticks(), 0);

        // Re-init is the only way out.
        dog.init(1).unwrap();
        assert_eq!(dog.kick(), KickOutcome::Started);
        assert_eq!(dog.tick(), TickOutcome::Running);
    }

    #[test]
    fn reload_bound_is_enforced() {
        let dog = LogicalWatchdog::new();
        assert_eq!(dog.init(u32::MAX), Err(ErrorCode::InvalidArgument));
        assert_eq!(
            dog.change_timeout_ticks(u32::MAX),
            Err(ErrorCode::InvalidArgument)
        );
        assert!(dog.init(u32::MAX - 1).is_ok());
    }

    #[test]
    fn timeout_change_applies_on_next_kick() {
        let dog = LogicalWatchdog::new();
        dog.init(1).unwrap();
        dog.kick();
        dog.change_timeout_ticks(4).unwrap();
        // Still counting with the old reload.
        assert_eq!(dog.remaining_ticks(), 2);
        dog.kick();
        assert_eq!(dog.remaining_ticks(), 5);
    }

    #[test]
    fn running_countdown_stays_in_range() {
        let dog = LogicalWatchdog::new();
        dog.init(3).unwrap();
        dog.kick();
        while dog.is_running() {
            let remaining = dog.remaining_ticks();
            assert!(remaining >= 1 && remaining <= 4);
            if dog.tick() != TickOutcome::Running {
                break;
            }
        }
    }
}
