// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Software crypto for the authenticated watchdog.
//!
//! Everything here is allocation-free and synchronous: a full ticket
//! verification (SHA-512 plus ECDSA P-521) takes on the order of seconds on
//! the target core, which the deferred-completion RPC path accounts for.

#![no_std]

pub mod ctr_drbg;
pub mod ecdsa;
pub mod sha512;
