// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Interface to the hardware watchdog.

/// The last-chance hardware watchdog.
///
/// Configured to reset the SoC after a fixed timeout with a pre-timeout
/// interrupt fired earlier; the pre-timeout handler is the final path that
/// persists supervisory state before the hardware pulls the reset line.
pub trait HardwareWatchdog {
    /// Configure and start the watchdog, pre-timeout interrupt included.
    fn start(&self);

    /// Service the watchdog, restarting its timeout.
    fn kick(&self);
}
