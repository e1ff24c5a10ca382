// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Re-export of the register interface crate.
//!
//! All MMIO maps in the arch and chip crates are written against these
//! types; going through this module keeps the dependency pinned in one
//! place.

pub use tock_registers::fields::{Field, FieldValue};
pub use tock_registers::interfaces;
pub use tock_registers::registers::{InMemoryRegister, ReadOnly, ReadWrite, WriteOnly};
pub use tock_registers::{register_bitfields, register_structs, LocalRegisterCopy, RegisterLongName};
