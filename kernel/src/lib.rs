// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Core abstractions shared by every crate of the supervisory-core firmware.
//!
//! This crate holds no policy of its own. It defines the error taxonomy, the
//! hardware interface layer (HIL) traits that the chip crate implements and
//! the service crates consume, and the small set of interior-mutability and
//! MMIO utilities the rest of the workspace is written against.

#![no_std]

pub mod debug;
pub mod errorcode;
pub mod hil;
pub mod utilities;

pub use crate::errorcode::ErrorCode;
