// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Secure non-volatile storage (SNVS) domain driver.
//!
//! Three services come out of this block:
//!
//! - the battery-backed general-purpose registers used as the persistent
//!   state store, bit-packed as follows (register 0 is multiplexed):
//!
//!   ```text
//!   GPR[0] bits  0..15 : wdTimerBackup (u16)
//!   GPR[0] bits 16..23 : wdStatus      (u8)
//!   GPR[0] bits 24..31 : fwuStatus     (u8)
//!   GPR[1]             : srtcOffset low  32 bits
//!   GPR[2]             : srtcOffset high 32 bits
//!   GPR[3] bits  0.. 7 : resetCause    (u8)
//!   ```
//!
//! - the 47-bit secure real-time counter (SRTC) at 32768 Hz, started once
//!   and then write-locked;
//!
//! - the high-power RTC whose periodic interrupt is the supervisory tick
//!   source, at 2^(15−k) Hz.
//!
//! Accesses to this domain are slow (several bus bridges away); callers
//! mirror the GPR fields and write through only on change.

use kernel::hil::backup::BackupRegisters;
use kernel::hil::time::MonotonicCounter;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use kernel::ErrorCode;

register_structs! {
    SnvsRegisters {
        /// HP Lock Register
        (0x000 => hplr: ReadWrite<u32>),
        /// HP Command Register
        (0x004 => hpcomr: ReadWrite<u32>),
        /// HP Control Register
        (0x008 => hpcr: ReadWrite<u32, HpControl::Register>),
        (0x00c => _reserved0),
        /// HP Status Register
        (0x014 => hpsr: ReadWrite<u32, HpStatus::Register>),
        (0x018 => _reserved1),
        /// HP Real-Time Counter MSB / LSB
        (0x024 => hprtcmr: ReadWrite<u32>),
        (0x028 => hprtclr: ReadWrite<u32>),
        (0x02c => _reserved2),
        /// LP Lock Register
        (0x034 => lplr: ReadWrite<u32, LpLock::Register>),
        /// LP Control Register
        (0x038 => lpcr: ReadWrite<u32, LpControl::Register>),
        (0x03c => _reserved3),
        /// LP Status Register
        (0x04c => lpsr: ReadWrite<u32>),
        /// LP Secure Real-Time Counter MSB / LSB
        (0x050 => lpsrtcmr: ReadWrite<u32, SrtcMsb::Register>),
        (0x054 => lpsrtclr: ReadWrite<u32>),
        (0x058 => _reserved4),
        /// LP General-Purpose Registers
        (0x090 => lpgpr: [ReadWrite<u32>; 4]),
        (0x0a0 => @END),
    }
}

register_bitfields![u32,
    HpControl [
        /// Button configuration (unused here, kept for completeness).
        BTN_CONFIG      OFFSET(24) NUMBITS(3),
        /// HP calibration value.
        HPCALB_VAL      OFFSET(10) NUMBITS(5),
        /// HP calibration enable.
        HPCALB_EN       OFFSET(8)  NUMBITS(1),
        /// Periodic-interrupt frequency: fires at 32768 / 2^(PI_FREQ) Hz.
        PI_FREQ         OFFSET(4)  NUMBITS(4),
        /// Periodic-interrupt enable.
        PI_EN           OFFSET(3)  NUMBITS(1),
        /// HP time alarm enable.
        HPTA_EN         OFFSET(1)  NUMBITS(1),
        /// HP real-time counter enable.
        RTC_EN          OFFSET(0)  NUMBITS(1)
    ],

    HpStatus [
        /// Periodic-interrupt flag, write 1 to clear.
        PI              OFFSET(1)  NUMBITS(1),
        /// HP time alarm flag.
        HPTA            OFFSET(0)  NUMBITS(1)
    ],

    LpLock [
        /// Lock write access to the general-purpose registers.
        GPR_HL          OFFSET(5)  NUMBITS(1),
        /// Lock write access to the monotonic counter.
        MC_HL           OFFSET(4)  NUMBITS(1),
        /// Lock write access to the LP calibration value.
        LPCALB_HL       OFFSET(3)  NUMBITS(1),
        /// Lock write access to the SRTC counter.
        SRTC_HL         OFFSET(2)  NUMBITS(1)
    ],

    LpControl [
        /// Dumb power-glitch enable (unused).
        PWR_GLITCH_EN   OFFSET(7)  NUMBITS(1),
        /// SRTC invalidate enable.
        SRTC_INV_EN     OFFSET(4)  NUMBITS(1),
        /// Monotonic counter enable.
        MC_ENV          OFFSET(2)  NUMBITS(1),
        /// LP time alarm enable.
        LPTA_EN         OFFSET(1)  NUMBITS(1),
        /// SRTC enable and valid.
        SRTC_ENV        OFFSET(0)  NUMBITS(1)
    ],

    SrtcMsb [
        /// Top 15 bits of the 47-bit SRTC counter.
        SRTC_MSB        OFFSET(0)  NUMBITS(15)
    ]
];

const SNVS_BASE: StaticRef<SnvsRegisters> =
    unsafe { StaticRef::new(0x40C9_0000 as *const SnvsRegisters) };

/// How often we retry a double read of the split counter before giving up.
const SRTC_READ_RETRIES: u8 = 3;

const WD_TIMER_MASK: u32 = 0x0000_FFFF;
const WD_TIMER_POS: u32 = 0;
const WD_STATUS_MASK: u32 = 0x00FF_0000;
const WD_STATUS_POS: u32 = 16;
const FWU_STATUS_MASK: u32 = 0xFF00_0000;
const FWU_STATUS_POS: u32 = 24;
const RESET_CAUSE_MASK: u32 = 0x0000_00FF;
const RESET_CAUSE_POS: u32 = 0;

const GPR_WD: usize = 0;
const GPR_OFFSET_LOW: usize = 1;
const GPR_OFFSET_HIGH: usize = 2;
const GPR_RESET_CAUSE: usize = 3;

pub struct Snvs {
    registers: StaticRef<SnvsRegisters>,
}

impl Snvs {
    pub const fn new() -> Snvs {
        Snvs {
            registers: SNVS_BASE,
        }
    }

    /// Bring up the low-power domain and start the SRTC if it is not already
    /// running. The counter is only zeroed on a genuinely cold start; across
    /// warm resets it keeps counting, which the whole time model relies on.
    ///
    /// Afterwards the SRTC and calibration value are write-locked. The lock
    /// is defense in depth only; the resource-domain controller isolates the
    /// block from the application core.
    pub fn init_srtc(&self) {
        let regs = self.registers;

        if regs.lpcr.read(LpControl::SRTC_ENV) == 0 {
            regs.lpsrtcmr.set(0);
            regs.lpsrtclr.set(0);
            regs.lpcr.modify(LpControl::SRTC_ENV::SET);
            while regs.lpcr.read(LpControl::SRTC_ENV) == 0 {}
        }

        regs.lplr.modify(LpLock::SRTC_HL::SET);
        regs.lplr.modify(LpLock::LPCALB_HL::SET);
    }

    /// Start the high-power RTC with its periodic interrupt at
    /// 2^(15−`frequency_exp`) Hz. The interrupt is configured at the
    /// peripheral only; unmasking the NVIC line is the board's move.
    pub fn init_periodic_tick(&self, frequency_exp: u32) {
        let regs = self.registers;

        regs.hpcr
            .modify(HpControl::PI_FREQ.val(15 - (frequency_exp & 0xF)));
        regs.hpcr.modify(HpControl::PI_EN::SET);
        regs.hpcr.modify(HpControl::RTC_EN::SET);
        while regs.hpcr.read(HpControl::RTC_EN) == 0 {}
    }

    /// True when the shared secure-domain interrupt was raised by the
    /// periodic tick.
    pub fn is_periodic_tick_pending(&self) -> bool {
        self.registers.hpsr.is_set(HpStatus::PI)
    }

    /// Acknowledge the periodic tick at the peripheral.
    pub fn clear_periodic_tick(&self) {
        self.registers.hpsr.write(HpStatus::PI::SET);
    }

    fn gpr_field(&self, index: usize, mask: u32, pos: u32) -> u32 {
        (self.registers.lpgpr[index].get() & mask) >> pos
    }

    fn set_gpr_field(&self, index: usize, mask: u32, pos: u32, value: u32) {
        let stored = self.registers.lpgpr[index].get();
        self.registers.lpgpr[index].set((stored & !mask) | ((value << pos) & mask));
    }
}

impl BackupRegisters for Snvs {
    fn set_wd_timer_backup(&self, value: u16) {
        self.set_gpr_field(GPR_WD, WD_TIMER_MASK, WD_TIMER_POS, value as u32);
    }

    fn wd_timer_backup(&self) -> u16 {
        self.gpr_field(GPR_WD, WD_TIMER_MASK, WD_TIMER_POS) as u16
    }

    fn set_wd_status(&self, status: u8) {
        self.set_gpr_field(GPR_WD, WD_STATUS_MASK, WD_STATUS_POS, status as u32);
    }

    fn wd_status(&self) -> u8 {
        self.gpr_field(GPR_WD, WD_STATUS_MASK, WD_STATUS_POS) as u8
    }

    fn set_fwu_status(&self, status: u8) {
        self.set_gpr_field(GPR_WD, FWU_STATUS_MASK, FWU_STATUS_POS, status as u32);
    }

    fn fwu_status(&self) -> u8 {
        self.gpr_field(GPR_WD, FWU_STATUS_MASK, FWU_STATUS_POS) as u8
    }

    // The two halves are not written atomically. A power loss between the
    // writes leaves a corrupted offset; SRTC monotonicity still guarantees
    // forward time, so this is tolerated.
    fn set_srtc_offset(&self, offset: i64) {
        self.registers.lpgpr[GPR_OFFSET_LOW].set(offset as u64 as u32);
        self.registers.lpgpr[GPR_OFFSET_HIGH].set((offset as u64 >> 32) as u32);
    }

    fn srtc_offset(&self) -> i64 {
        let low = self.registers.lpgpr[GPR_OFFSET_LOW].get() as u64;
        let high = self.registers.lpgpr[GPR_OFFSET_HIGH].get() as u64;
        ((high << 32) | low) as i64
    }

    fn set_reset_cause(&self, cause: u8) {
        self.set_gpr_field(GPR_RESET_CAUSE, RESET_CAUSE_MASK, RESET_CAUSE_POS, cause as u32);
    }

    fn reset_cause(&self) -> u8 {
        self.gpr_field(GPR_RESET_CAUSE, RESET_CAUSE_MASK, RESET_CAUSE_POS) as u8
    }
}

impl MonotonicCounter for Snvs {
    fn count(&self) -> Result<i64, ErrorCode> {
        let regs = self.registers;
        let mut tries = 0;
        loop {
            // Two consecutive reads of the split counter; a carry between
            // the halves makes them disagree and forces a retry.
            let first = ((regs.lpsrtcmr.read(SrtcMsb::SRTC_MSB) as u64) << 32)
                | regs.lpsrtclr.get() as u64;
            let second = ((regs.lpsrtcmr.read(SrtcMsb::SRTC_MSB) as u64) << 32)
                | regs.lpsrtclr.get() as u64;
            tries += 1;

            if first == second {
                // 47-bit counter, the sign bit can never be set.
                return Ok(first as i64);
            }
            if tries >= SRTC_READ_RETRIES {
                return Err(ErrorCode::Timeout);
            }
        }
    }
}
