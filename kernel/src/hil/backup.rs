// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Interface to the battery-backed persistent registers.
//!
//! The backing store is four 32-bit general-purpose registers in the
//! non-volatile power domain, bit-packed by the implementation. Accesses are
//! slow relative to normal RAM; callers are expected to mirror the fields
//! and write through only on change.
//!
//! All fields must read as zero after the backup domain loses power, and the
//! field encodings are chosen so that all-zeroes is a logically correct
//! fresh state.

/// Field accessors for the persistent supervisory state.
///
/// `wd_status`, `fwu_status` and `reset_cause` carry enum/bitfield values in
/// narrow integer storage; validation happens at load in the mirror layer,
/// not here.
pub trait BackupRegisters {
    /// Remaining authenticated-watchdog ticks in backup form (shifted right
    /// by 16 with ceiling; 0 only when actually expired).
    fn set_wd_timer_backup(&self, value: u16);
    fn wd_timer_backup(&self) -> u16;

    /// 1 if the authenticated watchdog was running at the last save.
    fn set_wd_status(&self, status: u8);
    fn wd_status(&self) -> u8;

    /// Firmware-update status bitfield.
    fn set_fwu_status(&self, status: u8);
    fn fwu_status(&self) -> u8;

    /// Signed offset added to the hardware counter to form real time.
    ///
    /// Stored as two 32-bit halves; the halves are not written atomically
    /// and a power loss between them leaves a corrupted offset. This is a
    /// documented limitation: counter monotonicity alone still guarantees
    /// forward time.
    fn set_srtc_offset(&self, offset: i64);
    fn srtc_offset(&self) -> i64;

    /// Cause of the last reset as a raw byte.
    fn set_reset_cause(&self, cause: u8);
    fn reset_cause(&self) -> u8;
}
