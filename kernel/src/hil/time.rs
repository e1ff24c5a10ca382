// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Interfaces to the secure time sources.

use crate::ErrorCode;

/// The battery-backed monotonic counter.
///
/// A 47-bit counter running at 32768 Hz in the secure low-power domain. It
/// is started once and never reprogrammed afterwards; wall-clock time is
/// formed by adding a persisted offset.
pub trait MonotonicCounter {
    /// Read the current counter value.
    ///
    /// The counter spans two registers; implementations re-read until two
    /// consecutive samples agree (bounded retries) to catch a carry between
    /// the halves, and return [`ErrorCode::Timeout`] if no stable value was
    /// observed.
    fn count(&self) -> Result<i64, ErrorCode>;
}
