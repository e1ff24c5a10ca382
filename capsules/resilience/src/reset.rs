// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Reset causes and their priority policy.
//!
//! The cause is persisted across resets in a single byte; the discriminants
//! are the on-wire values and must not change. All-zeroes storage must read
//! as "no cause", so `None` is 0.

/// Why the system was (or is about to be) reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ResetCause {
    None = 0,
    /// Explicitly requested through the reset RPC.
    Request = 1,
    /// The authenticated watchdog ran out; the next boot enters recovery.
    SecureWd = 2,
    /// A functional watchdog ran out.
    FunctionalWd = 3,
}

impl From<ResetCause> for u8 {
    fn from(cause: ResetCause) -> u8 {
        cause as u8
    }
}

impl TryFrom<u8> for ResetCause {
    type Error = ();

    fn try_from(raw: u8) -> Result<ResetCause, ()> {
        match raw {
            0 => Ok(ResetCause::None),
            1 => Ok(ResetCause::Request),
            2 => Ok(ResetCause::SecureWd),
            3 => Ok(ResetCause::FunctionalWd),
            _ => Err(()),
        }
    }
}

/// Map raw storage to a cause, failing closed: anything outside the known
/// set becomes [`ResetCause::SecureWd`] and so forces a recovery boot.
pub fn constrain(raw: u8) -> ResetCause {
    ResetCause::try_from(raw).unwrap_or(ResetCause::SecureWd)
}

/// The higher-priority of two causes: SecureWd > FunctionalWd > Request >
/// None.
pub fn combine(a: ResetCause, b: ResetCause) -> ResetCause {
    use ResetCause::*;
    if a == SecureWd || b == SecureWd {
        SecureWd
    } else if a == FunctionalWd || b == FunctionalWd {
        FunctionalWd
    } else if a == Request || b == Request {
        Request
    } else {
        None
    }
}
