// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! The in-RAM mirror pair of the persistent state store.
//!
//! Persistent-register accesses are slow, so two RAM copies are kept: the
//! Modified copy, mutated by application-path code (RPC handlers, the tick
//! ISR's watchdog backup), and the HW copy, tracking what the registers
//! actually hold. The main loop diffs the two and writes through changed
//! fields in a stable order — fwuStatus, resetCause, wdTimerBackup,
//! wdStatus, srtcOffset — chosen so that a power loss mid-sequence never
//! leaves boot-behavior fields trailing a newer watchdog state.
//!
//! On load, the stored values are sanity checked: a secure-watchdog reset
//! cause together with a still-running watchdog state, undefined firmware
//! status bits, or an unknown reset cause each invalidate the whole store,
//! which is then zeroed. A zeroed store reads as factory-fresh, and the
//! authenticated watchdog init turns that into a recovery boot on its own.

use core::cell::Cell;
use kernel::hil::backup::BackupRegisters;
use kernel::hil::gpio::SupervisedPins;
use kernel::hil::sync::InterruptLock;

use crate::reset::ResetCause;

/// Firmware-update status bits persisted for the bootloader.
pub mod fwu {
    /// Program the recovery image on the next boot.
    pub const REVERT: u8 = 0x01;
    /// Commit the new firmware version and create a recovery image.
    pub const COMMIT: u8 = 0x02;
    /// Back up configuration data.
    pub const BACKUP_CFG_DATA: u8 = 0x04;
    /// The authenticated watchdog expired; boot into recovery mode.
    pub const AWDT_EXPIRED: u8 = 0x08;
    /// Freshly programmed firmware must self-check before commit/revert.
    pub const VERIFY_FW: u8 = 0x10;
    /// The firmware timestamp could not be validated.
    pub const TIMESTAMP_ISSUE: u8 = 0x20;

    /// Any bit outside this mask invalidates the store.
    pub const VALID_MASK: u8 =
        REVERT | COMMIT | BACKUP_CFG_DATA | AWDT_EXPIRED | VERIFY_FW | TIMESTAMP_ISSUE;
}

/// One copy of the mirrored fields.
pub struct MirrorData {
    pub wd_timer_backup: Cell<u16>,
    pub wd_status: Cell<u8>,
    pub fwu_status: Cell<u8>,
    pub srtc_offset: Cell<i64>,
    pub reset_cause: Cell<u8>,
    pub gpio_output_status: Cell<u32>,
}

impl MirrorData {
    pub const fn new() -> MirrorData {
        MirrorData {
            wd_timer_backup: Cell::new(0),
            wd_status: Cell::new(0),
            fwu_status: Cell::new(0),
            srtc_offset: Cell::new(0),
            reset_cause: Cell::new(0),
            gpio_output_status: Cell::new(0),
        }
    }

    fn assign(&self, other: &MirrorData) {
        self.wd_timer_backup.set(other.wd_timer_backup.get());
        self.wd_status.set(other.wd_status.get());
        self.fwu_status.set(other.fwu_status.get());
        self.srtc_offset.set(other.srtc_offset.get());
        self.reset_cause.set(other.reset_cause.get());
        self.gpio_output_status.set(other.gpio_output_status.get());
    }
}

/// Result of loading the store at boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Stored values passed the sanity checks and were taken over.
    Loaded,
    /// Sanity checks failed; store and mirrors were zeroed. Boot proceeds
    /// on the fresh state.
    Cleared,
}

pub struct SnvsMirror {
    pub modified: MirrorData,
    pub hw: MirrorData,
}

impl SnvsMirror {
    pub const fn new() -> SnvsMirror {
        SnvsMirror {
            modified: MirrorData::new(),
            hw: MirrorData::new(),
        }
    }

    /// Load the persistent registers into both mirrors and sanity check
    /// them. `current_outputs` seeds the GPIO field (the output pins were
    /// just driven to their boot state and have no persistent backing).
    ///
    /// Must run before interrupts are enabled.
    pub fn load_and_check(
        &self,
        regs: &impl BackupRegisters,
        current_outputs: u32,
    ) -> LoadOutcome {
        let wd_timer_backup = regs.wd_timer_backup();
        let wd_status = regs.wd_status();
        let fwu_status = regs.fwu_status();
        let srtc_offset = regs.srtc_offset();
        let reset_cause = regs.reset_cause();

        let secure_but_running =
            reset_cause == u8::from(ResetCause::SecureWd) && wd_status > 0;
        let undefined_fwu_bits = fwu_status & !fwu::VALID_MASK != 0;
        let unknown_cause = ResetCause::try_from(reset_cause).is_err();

        if secure_but_running || undefined_fwu_bits || unknown_cause {
            regs.set_wd_timer_backup(0);
            regs.set_wd_status(0);
            regs.set_fwu_status(0);
            regs.set_srtc_offset(0);
            regs.set_reset_cause(0);

            self.hw.assign(&MirrorData::new());
            self.hw.gpio_output_status.set(current_outputs);
            self.modified.assign(&self.hw);
            LoadOutcome::Cleared
        } else {
            self.hw.wd_timer_backup.set(wd_timer_backup);
            self.hw.wd_status.set(wd_status);
            self.hw.fwu_status.set(fwu_status);
            self.hw.srtc_offset.set(srtc_offset);
            self.hw.reset_cause.set(reset_cause);
            self.hw.gpio_output_status.set(current_outputs);
            self.modified.assign(&self.hw);
            LoadOutcome::Loaded
        }
    }

    /// Main-loop write-back: diff the mirrors under the lock (so fields
    /// changed together in an ISR are latched together), then write changed
    /// fields through with interrupts enabled, in the canonical order.
    ///
    /// The watchdog backup is additionally written straight from the tick
    /// ISR; that path marks the HW copy up to date itself, so it never
    /// conflicts with this one.
    pub fn sync_storage<L: InterruptLock>(&self, lock: &L, regs: &impl BackupRegisters) {
        struct Diff {
            wd_timer_backup: bool,
            wd_status: bool,
            fwu_status: bool,
            srtc_offset: bool,
            reset_cause: bool,
        }

        let diff = lock.with_locked(|| {
            let diff = Diff {
                wd_timer_backup: self.modified.wd_timer_backup.get()
                    != self.hw.wd_timer_backup.get(),
                wd_status: self.modified.wd_status.get() != self.hw.wd_status.get(),
                fwu_status: self.modified.fwu_status.get() != self.hw.fwu_status.get(),
                srtc_offset: self.modified.srtc_offset.get() != self.hw.srtc_offset.get(),
                reset_cause: self.modified.reset_cause.get() != self.hw.reset_cause.get(),
            };
            self.hw.wd_timer_backup.set(self.modified.wd_timer_backup.get());
            self.hw.wd_status.set(self.modified.wd_status.get());
            self.hw.fwu_status.set(self.modified.fwu_status.get());
            self.hw.srtc_offset.set(self.modified.srtc_offset.get());
            self.hw.reset_cause.set(self.modified.reset_cause.get());
            diff
        });

        if diff.fwu_status {
            regs.set_fwu_status(self.hw.fwu_status.get());
        }
        if diff.reset_cause {
            regs.set_reset_cause(self.hw.reset_cause.get());
        }
        if diff.wd_timer_backup {
            regs.set_wd_timer_backup(self.hw.wd_timer_backup.get());
        }
        if diff.wd_status {
            regs.set_wd_status(self.hw.wd_status.get());
        }
        if diff.srtc_offset {
            regs.set_srtc_offset(self.hw.srtc_offset.get());
        }
    }

    /// Commit the output pins if the mirrored value changed. Cheap, so RPC
    /// handlers call it directly for immediate effect.
    pub fn sync_gpio(&self, pins: &impl SupervisedPins) {
        let modified = self.modified.gpio_output_status.get();
        if modified != self.hw.gpio_output_status.get() {
            pins.set_outputs(modified);
            self.hw.gpio_output_status.set(modified);
        }
    }

    /// Unconditional write-through of the Modified copy, canonical order.
    /// Reset path only: the caller is about to pull the system down and
    /// interrupts are off.
    pub fn write_through_all(&self, regs: &impl BackupRegisters) {
        regs.set_fwu_status(self.modified.fwu_status.get());
        regs.set_reset_cause(self.modified.reset_cause.get());
        regs.set_wd_timer_backup(self.modified.wd_timer_backup.get());
        regs.set_wd_status(self.modified.wd_status.get());
        regs.set_srtc_offset(self.modified.srtc_offset.get());
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::cell::RefCell;
    use std::string::String;
    use std::vec::Vec;

    struct FakeRegs {
        wd_timer_backup: Cell<u16>,
        wd_status: Cell<u8>,
        fwu_status: Cell<u8>,
        srtc_offset: Cell<i64>,
        reset_cause: Cell<u8>,
        writes: RefCell<Vec<String>>,
    }

    impl FakeRegs {
        fn new() -> FakeRegs {
            FakeRegs {
                wd_timer_backup: Cell::new(0),
                wd_status: Cell::new(0),
                fwu_status: Cell::new(0),
                srtc_offset: Cell::new(0),
                reset_cause: Cell::new(0),
                writes: RefCell::new(Vec::new()),
            }
        }

        fn written(&self) -> Vec<String> {
            self.writes.borrow().clone()
        }
    }

    impl BackupRegisters for FakeRegs {
        fn set_wd_timer_backup(&self, value: u16) {
            self.wd_timer_backup.set(value);
            self.writes.borrow_mut().push(String::from("wdTimerBackup"));
        }
        fn wd_timer_backup(&self) -> u16 {
            self.wd_timer_backup.get()
        }
        fn set_wd_status(&self, status: u8) {
            self.wd_status.set(status);
            self.writes.borrow_mut().push(String::from("wdStatus"));
        }
        fn wd_status(&self) -> u8 {
            self.wd_status.get()
        }
        fn set_fwu_status(&self, status: u8) {
            self.fwu_status.set(status);
            self.writes.borrow_mut().push(String::from("fwuStatus"));
        }
        fn fwu_status(&self) -> u8 {
            self.fwu_status.get()
        }
        fn set_srtc_offset(&self, offset: i64) {
            self.srtc_offset.set(offset);
            self.writes.borrow_mut().push(String::from("srtcOffset"));
        }
        fn srtc_offset(&self) -> i64 {
            self.srtc_offset.get()
        }
        fn set_reset_cause(&self, cause: u8) {
            self.reset_cause.set(cause);
            self.writes.borrow_mut().push(String::from("resetCause"));
        }
        fn reset_cause(&self) -> u8 {
            self.reset_cause.get()
        }
    }

    struct NoLock;
    impl InterruptLock for NoLock {
        fn with_locked<R, F: FnOnce() -> R>(&self, f: F) -> R {
            f()
        }
    }

    #[test]
    fn sane_state_is_taken_over() {
        let regs = FakeRegs::new();
        regs.wd_timer_backup.set(0x1234);
        regs.wd_status.set(1);
        regs.fwu_status.set(fwu::COMMIT | fwu::VERIFY_FW);
        regs.srtc_offset.set(-42);
        regs.reset_cause.set(ResetCause::FunctionalWd as u8);

        let mirror = SnvsMirror::new();
        assert_eq!(mirror.load_and_check(&regs, 0x18), LoadOutcome::Loaded);
        assert_eq!(mirror.modified.wd_timer_backup.get(), 0x1234);
        assert_eq!(mirror.modified.srtc_offset.get(), -42);
        assert_eq!(mirror.hw.gpio_output_status.get(), 0x18);
        assert!(regs.written().is_empty());
    }

    #[test]
    fn secure_cause_with_running_watchdog_clears_store() {
        let regs = FakeRegs::new();
        regs.reset_cause.set(ResetCause::SecureWd as u8);
        regs.wd_status.set(1);
        regs.wd_timer_backup.set(0x4444);

        let mirror = SnvsMirror::new();
        assert_eq!(mirror.load_and_check(&regs, 0), LoadOutcome::Cleared);
        assert_eq!(regs.wd_timer_backup.get(), 0);
        assert_eq!(regs.wd_status.get(), 0);
        assert_eq!(regs.reset_cause.get(), 0);
        assert_eq!(mirror.modified.wd_timer_backup.get(), 0);
    }

    #[test]
    fn undefined_fwu_bits_clear_store() {
        let regs = FakeRegs::new();
        regs.fwu_status.set(0x40);
        let mirror = SnvsMirror::new();
        assert_eq!(mirror.load_and_check(&regs, 0), LoadOutcome::Cleared);
    }

    #[test]
    fn unknown_reset_cause_clears_store() {
        let regs = FakeRegs::new();
        regs.reset_cause.set(7);
        let mirror = SnvsMirror::new();
        assert_eq!(mirror.load_and_check(&regs, 0), LoadOutcome::Cleared);
    }

    #[test]
    fn secure_cause_with_stopped_watchdog_is_sane() {
        let regs = FakeRegs::new();
        regs.reset_cause.set(ResetCause::SecureWd as u8);
        regs.wd_status.set(0);
        let mirror = SnvsMirror::new();
        assert_eq!(mirror.load_and_check(&regs, 0), LoadOutcome::Loaded);
    }

    #[test]
    fn sync_writes_only_changed_fields_in_canonical_order() {
        let regs = FakeRegs::new();
        let mirror = SnvsMirror::new();
        mirror.load_and_check(&regs, 0);

        mirror.modified.fwu_status.set(fwu::COMMIT);
        mirror.modified.wd_status.set(1);
        mirror.modified.srtc_offset.set(99);

        mirror.sync_storage(&NoLock, &regs);
        assert_eq!(regs.written(), ["fwuStatus", "wdStatus", "srtcOffset"]);
        assert_eq!(regs.fwu_status.get(), fwu::COMMIT);

        // A second pass with no further changes writes nothing.
        regs.writes.borrow_mut().clear();
        mirror.sync_storage(&NoLock, &regs);
        assert!(regs.written().is_empty());
    }

    #[test]
    fn full_write_through_uses_canonical_order() {
        let regs = FakeRegs::new();
        let mirror = SnvsMirror::new();
        mirror.modified.reset_cause.set(ResetCause::Request as u8);
        mirror.write_through_all(&regs);
        assert_eq!(
            regs.written(),
            ["fwuStatus", "resetCause", "wdTimerBackup", "wdStatus", "srtcOffset"]
        );
    }
}
