// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Interface to the system reset controller.

/// Full system reset.
pub trait SystemReset {
    /// Reset the SoC.
    ///
    /// On hardware this does not return; callers treat a return as fatal
    /// and spin until the hardware watchdog rescues the system. Test
    /// implementations record the call and return.
    fn system_reset(&self);
}
