// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Raw memory writes for the guarded memory-write service.

/// Volatile writes to arbitrary addresses.
///
/// Only the guarded memory-write path uses this, and only after its policy
/// table has approved the target range; the implementation performs the
/// access without further checks.
pub trait RawMemoryWrite {
    fn write_u8(&self, address: usize, value: u8);
    fn write_u16(&self, address: usize, value: u16);
    fn write_u32(&self, address: usize, value: u32);
}
