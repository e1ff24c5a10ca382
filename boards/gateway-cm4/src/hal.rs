// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! The board's HAL bundle: one struct tying the chip peripherals and the
//! architecture primitives to the kernel traits the supervisor is generic
//! over.

use cortexm4::scb;
use cortexm4::support;
use imxrt117x::gpio::SupervisedIo;
use imxrt117x::snvs::Snvs;
use imxrt117x::tempmon::Tempmon;
use imxrt117x::wdog::Wdog;
use kernel::hil::backup::BackupRegisters;
use kernel::hil::gpio::SupervisedPins;
use kernel::hil::mem::RawMemoryWrite;
use kernel::hil::reset::SystemReset;
use kernel::hil::sync::InterruptLock;
use kernel::hil::temperature::TemperatureSensor;
use kernel::hil::time::MonotonicCounter;
use kernel::hil::watchdog::HardwareWatchdog;
use kernel::ErrorCode;

pub struct Cm4Hal {
    snvs: &'static Snvs,
    io: &'static SupervisedIo,
    wdog: &'static Wdog,
    tempmon: &'static Tempmon,
}

impl Cm4Hal {
    pub fn new(
        snvs: &'static Snvs,
        io: &'static SupervisedIo,
        wdog: &'static Wdog,
        tempmon: &'static Tempmon,
    ) -> Cm4Hal {
        Cm4Hal {
            snvs,
            io,
            wdog,
            tempmon,
        }
    }
}

impl BackupRegisters for Cm4Hal {
    fn set_wd_timer_backup(&self, value: u16) {
        self.snvs.set_wd_timer_backup(value);
    }
    fn wd_timer_backup(&self) -> u16 {
        self.snvs.wd_timer_backup()
    }
    fn set_wd_status(&self, status: u8) {
        self.snvs.set_wd_status(status);
    }
    fn wd_status(&self) -> u8 {
        self.snvs.wd_status()
    }
    fn set_fwu_status(&self, status: u8) {
        self.snvs.set_fwu_status(status);
    }
    fn fwu_status(&self) -> u8 {
        self.snvs.fwu_status()
    }
    fn set_srtc_offset(&self, offset: i64) {
        self.snvs.set_srtc_offset(offset);
    }
    fn srtc_offset(&self) -> i64 {
        self.snvs.srtc_offset()
    }
    fn set_reset_cause(&self, cause: u8) {
        self.snvs.set_reset_cause(cause);
    }
    fn reset_cause(&self) -> u8 {
        self.snvs.reset_cause()
    }
}

impl MonotonicCounter for Cm4Hal {
    fn count(&self) -> Result<i64, ErrorCode> {
        self.snvs.count()
    }
}

impl SupervisedPins for Cm4Hal {
    fn set_outputs(&self, bitmap: u32) {
        self.io.set_outputs(bitmap);
    }
    fn outputs(&self) -> u32 {
        self.io.outputs()
    }
    fn debounced_inputs(&self) -> u32 {
        self.io.debounced_inputs()
    }
}

impl HardwareWatchdog for Cm4Hal {
    fn start(&self) {
        self.wdog.start();
    }
    fn kick(&self) {
        self.wdog.kick();
    }
}

impl SystemReset for Cm4Hal {
    fn system_reset(&self) {
        // SAFETY: resetting the SoC is this firmware's last word by
        // construction; callers have already persisted their state.
        unsafe {
            scb::reset();
        }
    }
}

impl TemperatureSensor for Cm4Hal {
    fn celsius(&self) -> f32 {
        self.tempmon.celsius()
    }
}

impl InterruptLock for Cm4Hal {
    fn with_locked<R, F: FnOnce() -> R>(&self, f: F) -> R {
        // SAFETY: the pair nests and is only used from non-ISR context, as
        // the trait requires.
        unsafe {
            support::enter_critical();
        }
        let result = f();
        unsafe {
            support::exit_critical();
        }
        result
    }
}

impl RawMemoryWrite for Cm4Hal {
    fn write_u8(&self, address: usize, value: u8) {
        // SAFETY: the soft MPU approved the target range before this path
        // is taken.
        unsafe {
            core::ptr::write_volatile(address as *mut u8, value);
        }
    }
    fn write_u16(&self, address: usize, value: u16) {
        unsafe {
            core::ptr::write_volatile(address as *mut u16, value);
        }
    }
    fn write_u32(&self, address: usize, value: u32) {
        unsafe {
            core::ptr::write_volatile(address as *mut u32, value);
        }
    }
}
