// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Standard error type for the supervisory core.
//!
//! Every subsystem converts its internal fine-grained status codes into this
//! taxonomy at its public boundary. The discriminants are part of the RPC
//! wire format (the per-call `retval` field carries them as a `u32`, with 0
//! reserved for success) and must not be reordered.

/// Standard errors across the supervisory core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    /// Generic failure condition, not further specified.
    Fail = 1,
    /// Underlying resource is busy.
    Busy = 2,
    /// Null-equivalent input, out-of-range id, malformed ticket, unsupported
    /// size or bad enum value.
    InvalidArgument = 3,
    /// Timestamp or tick arithmetic would overflow, or a saved backup value
    /// is too large.
    OutOfRange = 4,
    /// Supplied output buffer is too small.
    NoBuffer = 5,
    /// A bounded retry loop on a peripheral did not converge.
    Timeout = 6,
    /// RNG, hashing or key-parse failure at a point where recovery is
    /// impossible.
    Internal = 7,
    /// Signature verification failed, or a deferral was requested without a
    /// fresh valid ticket.
    SignatureInvalid = 8,
    /// Peer state inconsistent (only ever detected and reported by the peer
    /// core).
    Synchronization = 9,
}

impl From<ErrorCode> for u32 {
    fn from(err: ErrorCode) -> u32 {
        err as u32
    }
}

impl TryFrom<u32> for ErrorCode {
    type Error = ();

    fn try_from(val: u32) -> Result<ErrorCode, ()> {
        match val {
            1 => Ok(ErrorCode::Fail),
            2 => Ok(ErrorCode::Busy),
            3 => Ok(ErrorCode::InvalidArgument),
            4 => Ok(ErrorCode::OutOfRange),
            5 => Ok(ErrorCode::NoBuffer),
            6 => Ok(ErrorCode::Timeout),
            7 => Ok(ErrorCode::Internal),
            8 => Ok(ErrorCode::SignatureInvalid),
            9 => Ok(ErrorCode::Synchronization),
            _ => Err(()),
        }
    }
}

/// Encode a result for the RPC `retval` field. 0 is success.
pub fn into_retval(res: Result<(), ErrorCode>) -> u32 {
    match res {
        Ok(()) => 0,
        Err(e) => e.into(),
    }
}
