// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Layout of the shared-memory RPC region.
//!
//! One fixed `#[repr(C)]` structure, placed by the linker in a
//! non-cacheable RAM section both cores can see, 64-bit aligned. The layout
//! is the wire format: the application core carries a matching client.
//!
//! Synchronization is by the per-call status flags. The client sets a
//! slot's payload, then `is_new`; the server processes, writes `retval`,
//! then clears `is_new`; the client acknowledges results and events by
//! flipping the `is_processed` flags back. Payload fields are only touched
//! while the flags grant exclusivity, and every flag flip is preceded by a
//! data-memory barrier on the writing side.
//!
//! A second, smaller region carries the one-shot authenticated-watchdog
//! init data (seed and public key) from the bootloader, plus the ready
//! byte this core raises once its first persistent-state flush is done.

use core::sync::atomic::{AtomicBool, AtomicU8};
use kernel::utilities::cells::VolatileCell;

/// Payload capacity of the secure-watchdog slot (fits the largest ticket
/// and the nonce).
pub const SECWD_MAX_MSG_SIZE: usize = 150;
/// Seed buffer size in the init-data region.
pub const SECWD_MAX_SEED_SIZE: usize = 48;
/// Public-key buffer size in the init-data region (DER SubjectPublicKeyInfo).
pub const SECWD_MAX_PK_SIZE: usize = 158;
/// Data words one memory-write call can carry.
pub const MEM_WRITE_MAX_WORDS: usize = 8;

/// Debounced input states as published in the GPIO event, one bit each.
pub const INPUT4_DATA: u8 = 1 << 0;
pub const INPUT5_DATA: u8 = 1 << 1;
pub const INPUT6_DATA: u8 = 1 << 2;
pub const INPUT7_DATA: u8 = 1 << 3;

/// Output control word of the GPIO-out call: data bits plus modify bits.
pub const OUTPUT4_DATA: u16 = 1 << 0;
pub const OUTPUT5_DATA: u16 = 1 << 1;
pub const OUTPUT6_DATA: u16 = 1 << 2;
pub const OUTPUT7_DATA: u16 = 1 << 3;
pub const OUTPUT4_MODIFY: u16 = 1 << 4;
pub const OUTPUT5_MODIFY: u16 = 1 << 5;
pub const OUTPUT6_MODIFY: u16 = 1 << 6;
pub const OUTPUT7_MODIFY: u16 = 1 << 7;
pub const SPI_CS0_DATA: u16 = 1 << 8;
pub const SPI_CS1_DATA: u16 = 1 << 9;
pub const SPI_CS0_MODIFY: u16 = 1 << 10;
pub const SPI_CS1_MODIFY: u16 = 1 << 11;

/// All control bits a GPIO-out call may carry.
pub const OUTPUT_CONTROL_MASK: u16 = OUTPUT4_DATA
    | OUTPUT5_DATA
    | OUTPUT6_DATA
    | OUTPUT7_DATA
    | OUTPUT4_MODIFY
    | OUTPUT5_MODIFY
    | OUTPUT6_MODIFY
    | OUTPUT7_MODIFY
    | SPI_CS0_DATA
    | SPI_CS1_DATA
    | SPI_CS0_MODIFY
    | SPI_CS1_MODIFY;

const VOLATILE_ZERO: VolatileCell<u8> = VolatileCell::new(0);
const VOLATILE_ZERO_WORD: VolatileCell<u32> = VolatileCell::new(0);

/// Per-call synchronization record.
#[repr(C)]
pub struct CallStatus {
    /// Client raised a fresh request.
    pub is_new: AtomicBool,
    /// Client has consumed the result (server re-raises the signal until
    /// then).
    pub is_processed: AtomicBool,
    /// Server accepted the call but completes it from the main loop; the
    /// slot is off limits to the dispatcher meanwhile.
    pub await_async_completion: AtomicBool,
    /// Result code, 0 for success.
    pub retval: VolatileCell<u32>,
}

impl CallStatus {
    pub const fn new() -> CallStatus {
        CallStatus {
            is_new: AtomicBool::new(false),
            is_processed: AtomicBool::new(true),
            await_async_completion: AtomicBool::new(false),
            retval: VolatileCell::new(0),
        }
    }
}

/// Events pushed to the application core (no request part).
#[repr(C)]
pub struct EventBlock {
    pub is_reset_processed: AtomicBool,
    pub is_gpio_processed: AtomicBool,
    /// Cause of the pending reset.
    pub reset_cause: AtomicU8,
    /// Debounced input states ([`INPUT4_DATA`]..).
    pub gpio_state: AtomicU8,
}

impl EventBlock {
    pub const fn new() -> EventBlock {
        EventBlock {
            is_reset_processed: AtomicBool::new(true),
            is_gpio_processed: AtomicBool::new(true),
            reset_cause: AtomicU8::new(0),
            gpio_state: AtomicU8::new(0),
        }
    }
}

/// Kick one functional watchdog by id.
#[repr(C)]
pub struct FuncWdCall {
    pub status: CallStatus,
    pub watchdog_id: VolatileCell<u8>,
}

impl FuncWdCall {
    pub const fn new() -> FuncWdCall {
        FuncWdCall {
            status: CallStatus::new(),
            watchdog_id: VolatileCell::new(0),
        }
    }
}

/// Secure-watchdog call: fetch a nonce or submit a ticket, selected by
/// `is_nonce_not_kick`. Both complete asynchronously.
#[repr(C)]
pub struct SecWdCall {
    pub status: CallStatus,
    pub is_nonce_not_kick: VolatileCell<u8>,
    pub data_len: VolatileCell<u32>,
    pub data: [VolatileCell<u8>; SECWD_MAX_MSG_SIZE],
}

impl SecWdCall {
    pub const fn new() -> SecWdCall {
        SecWdCall {
            status: CallStatus::new(),
            is_nonce_not_kick: VolatileCell::new(0),
            data_len: VolatileCell::new(0),
            data: [VOLATILE_ZERO; SECWD_MAX_MSG_SIZE],
        }
    }

    /// Copy `src` into the payload and publish its length.
    pub fn write_data(&self, src: &[u8]) {
        for (cell, byte) in self.data.iter().zip(src.iter()) {
            cell.set(*byte);
        }
        self.data_len.set(src.len() as u32);
    }

    /// Copy the payload out. The destination bounds the copy; the shared
    /// length field was latched by the caller beforehand (the client could
    /// change it mid-copy otherwise).
    pub fn read_data(&self, dst: &mut [u8]) {
        for (byte, cell) in dst.iter_mut().zip(self.data.iter()) {
            *byte = cell.get();
        }
    }
}

/// Drive the user/SPI-select outputs.
#[repr(C)]
pub struct GpioOutCall {
    pub status: CallStatus,
    /// Control word, see [`OUTPUT_CONTROL_MASK`].
    pub gpio_state: VolatileCell<u16>,
}

impl GpioOutCall {
    pub const fn new() -> GpioOutCall {
        GpioOutCall {
            status: CallStatus::new(),
            gpio_state: VolatileCell::new(0),
        }
    }
}

/// Read or set the real-time clock.
#[repr(C)]
pub struct RtcCall {
    pub status: CallStatus,
    pub seconds: VolatileCell<u64>,
    pub milliseconds: VolatileCell<u16>,
    pub is_set_not_get: VolatileCell<u8>,
}

impl RtcCall {
    pub const fn new() -> RtcCall {
        RtcCall {
            status: CallStatus::new(),
            seconds: VolatileCell::new(0),
            milliseconds: VolatileCell::new(0),
            is_set_not_get: VolatileCell::new(0),
        }
    }
}

/// Firmware-update bookkeeping: read status bits or the previous reset
/// cause; request a commit or a revert.
#[repr(C)]
pub struct FwUpdateCall {
    pub status: CallStatus,
    pub fw_status: VolatileCell<u8>,
    pub reset_cause: VolatileCell<u8>,
    pub is_read_not_write: VolatileCell<u8>,
    pub is_commit_not_revert: VolatileCell<u8>,
    pub is_status_bits_not_reset_cause: VolatileCell<u8>,
}

impl FwUpdateCall {
    pub const fn new() -> FwUpdateCall {
        FwUpdateCall {
            status: CallStatus::new(),
            fw_status: VolatileCell::new(0),
            reset_cause: VolatileCell::new(0),
            is_read_not_write: VolatileCell::new(0),
            is_commit_not_revert: VolatileCell::new(0),
            is_status_bits_not_reset_cause: VolatileCell::new(0),
        }
    }
}

/// Reset the SoC with the given cause.
#[repr(C)]
pub struct ResetCall {
    pub status: CallStatus,
    pub cause: VolatileCell<u8>,
}

impl ResetCall {
    pub const fn new() -> ResetCall {
        ResetCall {
            status: CallStatus::new(),
            cause: VolatileCell::new(0),
        }
    }
}

/// Measure the MCU temperature.
#[repr(C)]
pub struct McuTempCall {
    pub status: CallStatus,
    pub temperature: VolatileCell<f32>,
}

impl McuTempCall {
    pub const fn new() -> McuTempCall {
        McuTempCall {
            status: CallStatus::new(),
            temperature: VolatileCell::new(0.0),
        }
    }
}

/// Guarded memory write into the whitelisted platform blocks.
#[repr(C)]
pub struct MemWriteCall {
    pub status: CallStatus,
    pub base_address: VolatileCell<u32>,
    /// 1, 2 or 4 bytes.
    pub access_size: VolatileCell<u8>,
    /// Number of entries of `data` to write; more than one only for word
    /// accesses.
    pub data_words: VolatileCell<u8>,
    pub data: [VolatileCell<u32>; MEM_WRITE_MAX_WORDS],
}

impl MemWriteCall {
    pub const fn new() -> MemWriteCall {
        MemWriteCall {
            status: CallStatus::new(),
            base_address: VolatileCell::new(0),
            access_size: VolatileCell::new(0),
            data_words: VolatileCell::new(0),
            data: [VOLATILE_ZERO_WORD; MEM_WRITE_MAX_WORDS],
        }
    }
}

/// The whole RPC region. One instance, placed by the linker.
#[repr(C, align(8))]
pub struct RpcSharedMemory {
    pub events: EventBlock,
    pub func_wd: FuncWdCall,
    pub sec_wd: SecWdCall,
    pub gpio_out: GpioOutCall,
    pub rtc: RtcCall,
    pub fw_update: FwUpdateCall,
    pub reset: ResetCall,
    pub mcu_temp: McuTempCall,
    pub mem_write: MemWriteCall,
}

impl RpcSharedMemory {
    /// Reset every slot to its initial protocol state: no pending calls,
    /// all results and events consumed.
    ///
    /// The region lives in a no-init section (its contents survive the
    /// linker, not this core's resets), so the boot path runs this once
    /// before the peer is released. Payload fields are left alone; the
    /// flags make them unreachable.
    pub fn reset_to_initial(&self) {
        use core::sync::atomic::Ordering;

        self.events.is_reset_processed.store(true, Ordering::Relaxed);
        self.events.is_gpio_processed.store(true, Ordering::Relaxed);

        for status in [
            &self.func_wd.status,
            &self.sec_wd.status,
            &self.gpio_out.status,
            &self.rtc.status,
            &self.fw_update.status,
            &self.reset.status,
            &self.mcu_temp.status,
            &self.mem_write.status,
        ] {
            status.is_new.store(false, Ordering::Relaxed);
            status.is_processed.store(true, Ordering::Relaxed);
            status.await_async_completion.store(false, Ordering::Relaxed);
            status.retval.set(0);
        }
    }

    /// The static initializer: no pending calls, all results consumed.
    pub const fn new() -> RpcSharedMemory {
        RpcSharedMemory {
            events: EventBlock::new(),
            func_wd: FuncWdCall::new(),
            sec_wd: SecWdCall::new(),
            gpio_out: GpioOutCall::new(),
            rtc: RtcCall::new(),
            fw_update: FwUpdateCall::new(),
            reset: ResetCall::new(),
            mcu_temp: McuTempCall::new(),
            mem_write: MemWriteCall::new(),
        }
    }
}

/// One-shot init handoff from the bootloader.
#[repr(C, align(8))]
pub struct AwdgHandoff {
    pub rng_seed: [VolatileCell<u8>; SECWD_MAX_SEED_SIZE],
    pub rng_seed_len: VolatileCell<u32>,
    pub public_key: [VolatileCell<u8>; SECWD_MAX_PK_SIZE],
    pub public_key_len: VolatileCell<u32>,
    /// Raised by this core once initialization is complete; the application
    /// core polls it before first RPC use.
    pub ready: AtomicU8,
}

impl AwdgHandoff {
    pub const fn new() -> AwdgHandoff {
        AwdgHandoff {
            rng_seed: [VOLATILE_ZERO; SECWD_MAX_SEED_SIZE],
            rng_seed_len: VolatileCell::new(0),
            public_key: [VOLATILE_ZERO; SECWD_MAX_PK_SIZE],
            public_key_len: VolatileCell::new(0),
            ready: AtomicU8::new(0),
        }
    }

    /// Copy the seed out. Returns the advertised length, clamped to the
    /// buffer.
    pub fn read_seed(&self, dst: &mut [u8; SECWD_MAX_SEED_SIZE]) -> usize {
        for (byte, cell) in dst.iter_mut().zip(self.rng_seed.iter()) {
            *byte = cell.get();
        }
        (self.rng_seed_len.get() as usize).min(SECWD_MAX_SEED_SIZE)
    }

    /// Copy the public key out. Returns the advertised length, clamped to
    /// the buffer.
    pub fn read_public_key(&self, dst: &mut [u8; SECWD_MAX_PK_SIZE]) -> usize {
        for (byte, cell) in dst.iter_mut().zip(self.public_key.iter()) {
            *byte = cell.get();
        }
        (self.public_key_len.get() as usize).min(SECWD_MAX_PK_SIZE)
    }

    /// Wipe the one-shot secrets. Volatile cell writes, so the stores are
    /// not elided.
    pub fn clear_secrets(&self) {
        for cell in self.rng_seed.iter() {
            cell.set(0);
        }
        self.rng_seed_len.set(0);
        for cell in self.public_key.iter() {
            cell.set(0);
        }
        self.public_key_len.set(0);
    }
}
