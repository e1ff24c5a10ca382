// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! The supervisory orchestrator.
//!
//! Glue between the watchdog primitives, the persistent-state mirrors, the
//! RPC dispatcher and the platform: boot-time restoration, the periodic
//! tick, the reset policy and the guarded memory-write service all live
//! here. The board wires the interrupt vectors into the `handle_*` methods
//! and drives [`Supervisor::sync_state_main`] from its main loop.
//!
//! Interrupts do not nest on this platform. Tick-ISR state is therefore
//! only guarded against the non-ISR paths (deferral, mirror sync), which
//! take the interrupt lock; everything mutated inside handlers runs to
//! completion on its own.
//!
//! The authenticated watchdog's countdown is persisted every tick in a
//! compressed form: remaining ticks shifted right by 16 with ceiling, so
//! the stored value is zero exactly when the watchdog has expired. The
//! backup write bypasses the main-loop mirror sync — an application core
//! that pins this core's main loop with RPC traffic must not be able to
//! stall the countdown's persistence.

use core::cell::Cell;
use kernel::hil::backup::BackupRegisters;
use kernel::hil::gpio::{SupervisedPin, SupervisedPins};
use kernel::hil::mem::RawMemoryWrite;
use kernel::hil::reset::SystemReset;
use kernel::hil::sync::InterruptLock;
use kernel::hil::temperature::TemperatureSensor;
use kernel::hil::time::MonotonicCounter;
use kernel::hil::watchdog::HardwareWatchdog;
use kernel::utilities::cells::{MapCell, OptionalCell};
use kernel::ErrorCode;

use crate::awdg::{AuthenticatedWatchdog, InitOutcome};
use crate::lwdg_unit::{UnitTickOutcome, WatchdogUnit};
use crate::reset::{combine, constrain, ResetCause};
use crate::rpc::server::{EventSink, SupervisorServices};
use crate::rpc::shm;
use crate::rtc::{offset_for_time, time_from_counter, Timestamp};
use crate::snvs_mirror::{fwu, SnvsMirror};
use crate::soft_mpu::{is_access_allowed, MpuEntry};

/// Everything the supervisor needs from the platform.
pub trait SupervisorHal:
    BackupRegisters
    + MonotonicCounter
    + SupervisedPins
    + HardwareWatchdog
    + SystemReset
    + TemperatureSensor
    + InterruptLock
    + RawMemoryWrite
{
}

impl<T> SupervisorHal for T where
    T: BackupRegisters
        + MonotonicCounter
        + SupervisedPins
        + HardwareWatchdog
        + SystemReset
        + TemperatureSensor
        + InterruptLock
        + RawMemoryWrite
{
}

/// Right shift compressing remaining AWDG ticks into the 16-bit backup
/// field.
pub const BACKUP_SHIFT: u32 = 16;
const BACKUP_ROUNDING: u32 = (1 << BACKUP_SHIFT) - 1;

/// Compress remaining ticks for the persistent store. Rounds up, so the
/// result is zero only for an actually expired watchdog (a stored zero is
/// paired with a stopped status).
fn ticks_to_backup(ticks: u32) -> u16 {
    if ticks > u32::MAX - BACKUP_ROUNDING {
        u16::MAX
    } else {
        ((ticks + BACKUP_ROUNDING) >> BACKUP_SHIFT) as u16
    }
}

/// Compile-time configuration, owned by the board.
#[derive(Clone, Copy)]
pub struct Config<const FWDGS: usize> {
    /// Supervisory tick frequency; also the watchdog tick frequency.
    pub tick_frequency_hz: u32,
    /// Grace period shared by the functional watchdogs.
    pub functional_grace_ms: u32,
    /// Per-member functional watchdog timeouts.
    pub functional_timeouts_ms: [u32; FWDGS],
    /// Timeout the authenticated watchdog starts with on a fresh boot.
    pub awdg_initial_timeout_ms: u32,
    /// Grace period of the authenticated watchdog.
    pub awdg_grace_ms: u32,
    /// Supervisory ticks between hardware-watchdog kicks. Must be sized so
    /// the kick lands before the pre-timeout interrupt would fire.
    pub hardware_watchdog_kick_reload: u32,
    /// Address windows the memory-write service may touch at all.
    pub mem_write_windows: &'static [(usize, usize)],
    /// Allow/deny table consulted for writes inside the windows.
    pub mem_write_policy: &'static [MpuEntry],
}

pub struct Supervisor<'a, H: SupervisorHal, const FWDGS: usize> {
    hal: &'a H,
    config: Config<FWDGS>,
    mirror: SnvsMirror,
    functional: WatchdogUnit<FWDGS>,
    awdg: MapCell<AuthenticatedWatchdog>,
    events: OptionalCell<&'a dyn EventSink>,
    /// Reset cause of the previous boot, latched read-only at init.
    previous_reset_cause: Cell<ResetCause>,
    /// Last published debounced input state.
    gpio_inputs: Cell<u32>,
    ticks_until_hwdg_kick: Cell<u32>,
}

impl<'a, H: SupervisorHal, const FWDGS: usize> Supervisor<'a, H, FWDGS> {
    pub fn new(hal: &'a H, config: Config<FWDGS>) -> Result<Supervisor<'a, H, FWDGS>, ErrorCode> {
        let functional: WatchdogUnit<FWDGS> =
            WatchdogUnit::new(config.functional_grace_ms, config.tick_frequency_hz)?;
        for (id, timeout_ms) in config.functional_timeouts_ms.iter().enumerate() {
            functional.init_member(id as u8, *timeout_ms)?;
        }

        Ok(Supervisor {
            hal,
            config,
            mirror: SnvsMirror::new(),
            functional,
            awdg: MapCell::empty(),
            events: OptionalCell::empty(),
            previous_reset_cause: Cell::new(ResetCause::None),
            gpio_inputs: Cell::new(0),
            ticks_until_hwdg_kick: Cell::new(0),
        })
    }

    /// Late-bind the event channel (the RPC server, which in turn refers to
    /// this supervisor).
    pub fn set_event_sink(&self, sink: &'a dyn EventSink) {
        self.events.set(sink);
    }

    /// Restore persistent state and start the watchdogs. Must run with
    /// interrupts disabled, once, before the tick interrupt is unmasked.
    ///
    /// `rng_seed` and `public_key_der` are the bootloader's one-shot
    /// handoff; the caller wipes its copies afterwards. On error the caller
    /// must force a recovery boot — the board treats it like a hardware
    /// watchdog bailout.
    pub fn init(&self, rng_seed: &[u8], public_key_der: &[u8]) -> Result<(), ErrorCode> {
        // If the inputs still bounce at boot an intermediate state is read,
        // which is not wrong.
        self.gpio_inputs.set(self.hal.debounced_inputs());

        // A store that fails its sanity checks is zeroed and boot proceeds
        // on the fresh state; the authenticated watchdog then comes up
        // fresh, flags the expiry and the next boot enters recovery.
        let _ = self.mirror.load_and_check(self.hal, self.hal.outputs());

        self.previous_reset_cause
            .set(constrain(self.mirror.modified.reset_cause.get()));
        self.mirror
            .modified
            .reset_cause
            .set(ResetCause::None.into());

        self.init_authenticated_watchdog(rng_seed, public_key_der)?;

        // First flush, before the peer core is allowed to interact: the
        // halved backup must hit the store before any attacker-controlled
        // traffic can stall the main loop.
        self.mirror.sync_storage(self.hal, self.hal);
        // The last persistent-register write is dropped if a reset follows
        // immediately; one read from the domain flushes it.
        let _ = self.hal.wd_status();

        Ok(())
    }

    fn init_authenticated_watchdog(
        &self,
        rng_seed: &[u8],
        public_key_der: &[u8],
    ) -> Result<(), ErrorCode> {
        let was_running = self.mirror.modified.wd_status.get() > 0;
        let mut saved_ticks = 0;
        if was_running {
            // Halve the stored countdown before resuming: a reboot loop
            // must make monotonic progress towards expiry.
            let halved = self.mirror.modified.wd_timer_backup.get() >> 1;
            self.mirror.modified.wd_timer_backup.set(halved);
            saved_ticks = (halved as u32) << BACKUP_SHIFT;
        }

        let (awdg, outcome) = AuthenticatedWatchdog::new(
            self.config.awdg_initial_timeout_ms,
            self.config.awdg_grace_ms,
            self.config.tick_frequency_hz,
            saved_ticks,
            was_running,
            rng_seed,
            public_key_der,
        )?;

        // One tick takes back the served-interval credit the starting kick
        // granted; without it a fresh backup value would round up past the
        // configured timeout.
        let tick_outcome = awdg.tick();

        if outcome == InitOutcome::Fresh {
            let remaining = awdg.remaining_ticks();
            self.mirror
                .modified
                .wd_timer_backup
                .set(ticks_to_backup(remaining));
            self.mirror.modified.wd_status.set(1);
            // A fresh watchdog means the countdown did not survive: either
            // the backup battery was out, or the previous run expired. Both
            // must land in recovery, so the expiry flag is set either way.
            let status = self.mirror.modified.fwu_status.get();
            self.mirror
                .modified
                .fwu_status
                .set(status | fwu::AWDT_EXPIRED);
        }

        self.awdg.put(awdg);

        match tick_outcome {
            // The restored countdown was already exhausted.
            UnitTickOutcome::GraceStarted => self.handle_awdg_expiration(),
            UnitTickOutcome::GraceExpired => self.reset_system(ResetCause::SecureWd),
            _ => {}
        }
        Ok(())
    }

    /// Publish the boot-time input state to the application core. The event
    /// is retransmitted until acknowledged, so it does not matter whether
    /// the peer is up yet. Callers hold the interrupt lock.
    pub fn publish_initial_inputs(&self) {
        let inputs = self.hal.debounced_inputs();
        self.gpio_inputs.set(inputs);
        self.events
            .map(|events| events.notify_gpio_change(inputs_to_event(inputs)));
    }

    /// Bookkeeping for an authenticated-watchdog expiry: flag the recovery
    /// boot, raise the reset cause, clear the persisted countdown and warn
    /// the peer. Interrupt context (or pre-interrupt init) only.
    fn handle_awdg_expiration(&self) {
        let status = self.mirror.modified.fwu_status.get();
        self.mirror
            .modified
            .fwu_status
            .set(status | fwu::AWDT_EXPIRED);
        self.mirror
            .modified
            .reset_cause
            .set(ResetCause::SecureWd.into());
        self.mirror.modified.wd_timer_backup.set(0);
        self.mirror.modified.wd_status.set(0);
        // If the peer never sees this it only loses its log-flush window;
        // the reset happens regardless.
        self.events
            .map(|events| events.notify_reset(ResetCause::SecureWd));
    }

    /// The periodic supervisory tick. Call from the tick interrupt.
    pub fn handle_tick_isr(&self) {
        let mut reset_system = false;

        match self.functional.tick() {
            UnitTickOutcome::GraceStarted => {
                let cause = combine(
                    ResetCause::FunctionalWd,
                    constrain(self.mirror.modified.reset_cause.get()),
                );
                self.mirror.modified.reset_cause.set(cause.into());
                self.events
                    .map(|events| events.notify_reset(ResetCause::FunctionalWd));
            }
            UnitTickOutcome::GraceExpired => reset_system = true,
            _ => {}
        }

        self.awdg.map(|awdg| {
            let outcome = awdg.tick();
            let backup = ticks_to_backup(awdg.remaining_ticks());
            if backup > 0 {
                self.mirror.modified.wd_timer_backup.set(backup);
                // Straight to hardware, skipping the main-loop sync: the
                // countdown's persistence must not depend on the main loop
                // getting cycles. Marking the HW copy here keeps the sync
                // path from re-writing it.
                if backup != self.mirror.hw.wd_timer_backup.get() {
                    self.hal.set_wd_timer_backup(backup);
                    self.mirror.hw.wd_timer_backup.set(backup);
                }
            } else if outcome == UnitTickOutcome::GraceStarted {
                self.handle_awdg_expiration();
            } else if outcome == UnitTickOutcome::GraceExpired {
                reset_system = true;
            }
        });

        if reset_system {
            self.reset_system(constrain(self.mirror.modified.reset_cause.get()));
        }

        if self.ticks_until_hwdg_kick.get() == 0 {
            self.hal.kick();
            self.ticks_until_hwdg_kick
                .set(self.config.hardware_watchdog_kick_reload);
        }
        self.ticks_until_hwdg_kick
            .set(self.ticks_until_hwdg_kick.get() - 1);
    }

    /// Debounce bookkeeping. Call from the systick interrupt, after the
    /// GPIO driver advanced its counters.
    pub fn handle_systick_isr(&self) {
        let inputs = self.hal.debounced_inputs();
        if inputs != self.gpio_inputs.get() {
            self.events
                .map(|events| events.notify_gpio_change(inputs_to_event(inputs)));
            self.gpio_inputs.set(inputs);
        }
    }

    /// Last-chance persistence before the hardware watchdog pulls the
    /// line. The mirrors are not trusted at this point (the code that
    /// maintains them evidently is not running properly); the registers are
    /// written directly. Call from the pre-timeout interrupt or on a failed
    /// init.
    pub fn handle_hardware_watchdog_isr(&self) {
        self.hal
            .set_fwu_status(self.hal.fwu_status() | fwu::AWDT_EXPIRED);
        self.hal.set_reset_cause(ResetCause::SecureWd.into());
        self.hal.set_wd_timer_backup(0);
        self.hal.set_wd_status(0);
        let _ = self.hal.wd_status();
        self.hal.system_reset();
        // Spin until the hardware watchdog finishes the job.
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        loop {
            core::hint::spin_loop();
        }
    }

    /// The single reset point: combine the cause with whatever is pending,
    /// persist everything in the canonical order and pull the system down.
    /// Interrupts must be disabled.
    pub fn reset_system(&self, cause: ResetCause) {
        let combined = combine(cause, constrain(self.mirror.modified.reset_cause.get()));
        self.mirror.modified.reset_cause.set(combined.into());

        if combined == ResetCause::SecureWd {
            let status = self.mirror.modified.fwu_status.get();
            self.mirror
                .modified
                .fwu_status
                .set(status | fwu::AWDT_EXPIRED);
            self.mirror.modified.wd_timer_backup.set(0);
            self.mirror.modified.wd_status.set(0);
        }

        self.mirror.write_through_all(self.hal);
        // Without this read the last register write can be lost across the
        // reset.
        let _ = self.hal.wd_status();
        self.hal.system_reset();
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        loop {
            core::hint::spin_loop();
        }
    }

    /// Main-loop write-back of the mirrors.
    pub fn sync_state_main(&self) {
        self.mirror.sync_storage(self.hal, self.hal);
    }

    /// The previous boot's reset cause (read-only snapshot).
    pub fn previous_cause(&self) -> ResetCause {
        self.previous_reset_cause.get()
    }
}

/// Translate the debounced pin bank into the event encoding (inputs 4..=7
/// in the low nibble).
fn inputs_to_event(inputs: u32) -> u8 {
    let mut event = 0;
    if inputs & SupervisedPin::UserInput0.mask() != 0 {
        event |= shm::INPUT4_DATA;
    }
    if inputs & SupervisedPin::UserInput1.mask() != 0 {
        event |= shm::INPUT5_DATA;
    }
    if inputs & SupervisedPin::UserInput2.mask() != 0 {
        event |= shm::INPUT6_DATA;
    }
    if inputs & SupervisedPin::UserInput3.mask() != 0 {
        event |= shm::INPUT7_DATA;
    }
    event
}

impl<H: SupervisorHal, const FWDGS: usize> SupervisorServices for Supervisor<'_, H, FWDGS> {
    fn kick_functional_watchdog(&self, id: u8) -> Result<(), ErrorCode> {
        self.functional.kick(id).map(|_| ())
    }

    fn secure_watchdog_nonce(&self, dst: &mut [u8]) -> Result<u32, ErrorCode> {
        self.awdg
            .map(|awdg| match awdg.nonce() {
                Some(nonce) => {
                    if dst.len() < nonce.len() {
                        return Err(ErrorCode::NoBuffer);
                    }
                    dst[..nonce.len()].copy_from_slice(&nonce);
                    Ok(nonce.len() as u32)
                }
                None => Err(ErrorCode::Internal),
            })
            .unwrap_or(Err(ErrorCode::Fail))
    }

    fn secure_watchdog_ticket(&self, ticket: &[u8]) -> Result<(), ErrorCode> {
        let result = self
            .awdg
            .map(|awdg| {
                awdg.validate_ticket(ticket)?;
                // The deferral shares the countdown with the tick
                // interrupt.
                self.hal.with_locked(|| awdg.defer())
            })
            .unwrap_or(Err(ErrorCode::Fail));

        if result.is_ok() {
            // A fresh authorized deferral supersedes a recorded expiry.
            self.hal.with_locked(|| {
                let status = self.mirror.modified.fwu_status.get();
                self.mirror
                    .modified
                    .fwu_status
                    .set(status & !fwu::AWDT_EXPIRED);
            });
        }
        result
    }

    fn set_outputs(&self, control: u16) -> Result<(), ErrorCode> {
        if control & !shm::OUTPUT_CONTROL_MASK != 0 {
            return Err(ErrorCode::InvalidArgument);
        }

        const PINS: [(u16, u16, SupervisedPin); 6] = [
            (shm::OUTPUT4_MODIFY, shm::OUTPUT4_DATA, SupervisedPin::UserOutput0),
            (shm::OUTPUT5_MODIFY, shm::OUTPUT5_DATA, SupervisedPin::UserOutput1),
            (shm::OUTPUT6_MODIFY, shm::OUTPUT6_DATA, SupervisedPin::UserOutput2),
            (shm::OUTPUT7_MODIFY, shm::OUTPUT7_DATA, SupervisedPin::UserOutput3),
            (shm::SPI_CS0_MODIFY, shm::SPI_CS0_DATA, SupervisedPin::SpiSelect0),
            (shm::SPI_CS1_MODIFY, shm::SPI_CS1_DATA, SupervisedPin::SpiSelect1),
        ];

        for (modify, data, pin) in PINS {
            if control & modify != 0 {
                let current = self.mirror.modified.gpio_output_status.get();
                let updated = if control & data != 0 {
                    current | pin.mask()
                } else {
                    current & !pin.mask()
                };
                self.mirror.modified.gpio_output_status.set(updated);
            }
        }

        // Output commits are cheap; write through right here so the user
        // sees the effect with the RPC completion.
        self.mirror.sync_gpio(self.hal);
        Ok(())
    }

    fn rtc_time(&self) -> Result<Timestamp, ErrorCode> {
        let offset = self.mirror.modified.srtc_offset.get();
        let counter = self.hal.count()?;
        time_from_counter(counter, offset)
    }

    fn set_rtc_time(&self, time: Timestamp) -> Result<(), ErrorCode> {
        let counter = self.hal.count()?;
        let offset = offset_for_time(time, counter)?;
        self.mirror.modified.srtc_offset.set(offset);
        Ok(())
    }

    fn fw_update_status(&self) -> u8 {
        self.mirror.modified.fwu_status.get()
    }

    fn previous_reset_cause(&self) -> u8 {
        self.previous_reset_cause.get().into()
    }

    fn request_firmware_commit(&self) {
        let status = self.mirror.modified.fwu_status.get();
        self.mirror.modified.fwu_status.set(status | fwu::COMMIT);
    }

    fn request_firmware_revert(&self) {
        let status = self.mirror.modified.fwu_status.get();
        self.mirror.modified.fwu_status.set(status | fwu::REVERT);
    }

    fn reset_system(&self, cause: ResetCause) {
        Supervisor::reset_system(self, cause);
    }

    fn mcu_temperature(&self) -> f32 {
        self.hal.celsius()
    }

    fn guarded_memory_write(&self, address: usize, value: u32, size: u8) {
        if size == 0 {
            return;
        }

        let in_window = self
            .config
            .mem_write_windows
            .iter()
            .any(|&(base, window)| address >= base && address - base < window);
        if !in_window {
            self.reset_system(ResetCause::SecureWd);
            return;
        }

        if !is_access_allowed(self.config.mem_write_policy, address, size as usize) {
            self.reset_system(ResetCause::SecureWd);
            return;
        }

        match size {
            1 => self.hal.write_u8(address, value as u8),
            2 => self.hal.write_u16(address, value as u16),
            4 => self.hal.write_u32(address, value),
            _ => self.reset_system(ResetCause::SecureWd),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::cell::RefCell;
    use p521::ecdsa::signature::hazmat::PrehashSigner;
    use p521::ecdsa::{Signature, SigningKey};
    use p521::pkcs8::EncodePublicKey;
    use std::vec::Vec;

    struct FakeHal {
        wd_timer_backup: Cell<u16>,
        wd_status: Cell<u8>,
        fwu_status: Cell<u8>,
        srtc_offset: Cell<i64>,
        reset_cause: Cell<u8>,
        counter: Cell<i64>,
        outputs: Cell<u32>,
        inputs: Cell<u32>,
        hw_kicks: Cell<u32>,
        system_resets: Cell<u32>,
        raw_writes: RefCell<Vec<(usize, u32, u8)>>,
    }

    impl FakeHal {
        fn new() -> FakeHal {
            FakeHal {
                wd_timer_backup: Cell::new(0),
                wd_status: Cell::new(0),
                fwu_status: Cell::new(0),
                srtc_offset: Cell::new(0),
                reset_cause: Cell::new(0),
                counter: Cell::new(1000),
                outputs: Cell::new(0),
                inputs: Cell::new(0),
                hw_kicks: Cell::new(0),
                system_resets: Cell::new(0),
                raw_writes: RefCell::new(Vec::new()),
            }
        }
    }

    impl BackupRegisters for FakeHal {
        fn set_wd_timer_backup(&self, value: u16) {
            self.wd_timer_backup.set(value);
        }
        fn wd_timer_backup(&self) -> u16 {
            self.wd_timer_backup.get()
        }
        fn set_wd_status(&self, status: u8) {
            self.wd_status.set(status);
        }
        fn wd_status(&self) -> u8 {
            self.wd_status.get()
        }
        fn set_fwu_status(&self, status: u8) {
            self.fwu_status.set(status);
        }
        fn fwu_status(&self) -> u8 {
            self.fwu_status.get()
        }
        fn set_srtc_offset(&self, offset: i64) {
            self.srtc_offset.set(offset);
        }
        fn srtc_offset(&self) -> i64 {
            self.srtc_offset.get()
        }
        fn set_reset_cause(&self, cause: u8) {
            self.reset_cause.set(cause);
        }
        fn reset_cause(&self) -> u8 {
            self.reset_cause.get()
        }
    }

    impl MonotonicCounter for FakeHal {
        fn count(&self) -> Result<i64, ErrorCode> {
            Ok(self.counter.get())
        }
    }

    impl SupervisedPins for FakeHal {
        fn set_outputs(&self, bitmap: u32) {
            self.outputs.set(bitmap);
        }
        fn outputs(&self) -> u32 {
            self.outputs.get()
        }
        fn debounced_inputs(&self) -> u32 {
            self.inputs.get()
        }
    }

    impl HardwareWatchdog for FakeHal {
        fn start(&self) {}
        fn kick(&self) {
            self.hw_kicks.set(self.hw_kicks.get() + 1);
        }
    }

    impl SystemReset for FakeHal {
        fn system_reset(&self) {
            self.system_resets.set(self.system_resets.get() + 1);
        }
    }

    impl TemperatureSensor for FakeHal {
        fn celsius(&self) -> f32 {
            36.5
        }
    }

    impl InterruptLock for FakeHal {
        fn with_locked<R, F: FnOnce() -> R>(&self, f: F) -> R {
            f()
        }
    }

    impl RawMemoryWrite for FakeHal {
        fn write_u8(&self, address: usize, value: u8) {
            self.raw_writes.borrow_mut().push((address, value as u32, 1));
        }
        fn write_u16(&self, address: usize, value: u16) {
            self.raw_writes.borrow_mut().push((address, value as u32, 2));
        }
        fn write_u32(&self, address: usize, value: u32) {
            self.raw_writes.borrow_mut().push((address, value, 4));
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Event {
        Reset(ResetCause),
        Gpio(u8),
    }

    #[derive(Default)]
    struct FakeSink {
        events: RefCell<Vec<Event>>,
    }

    impl EventSink for FakeSink {
        fn notify_reset(&self, cause: ResetCause) {
            self.events.borrow_mut().push(Event::Reset(cause));
        }
        fn notify_gpio_change(&self, inputs: u8) {
            self.events.borrow_mut().push(Event::Gpio(inputs));
        }
    }

    const MEM_WINDOWS: &[(usize, usize)] = &[(0x4000_0000, 0x1000)];
    const MEM_POLICY: &[MpuEntry] = &[
        MpuEntry::from_base_size(0x4000_0000, 0x1000, crate::soft_mpu::AccessPolicy::Allow),
        MpuEntry::from_base_size(0x4000_0800, 0x100, crate::soft_mpu::AccessPolicy::Deny),
    ];

    fn test_config() -> Config<1> {
        Config {
            tick_frequency_hz: 1000,
            functional_grace_ms: 2,
            functional_timeouts_ms: [3],
            awdg_initial_timeout_ms: 3_600_000,
            awdg_grace_ms: 5000,
            hardware_watchdog_kick_reload: 3,
            mem_write_windows: MEM_WINDOWS,
            mem_write_policy: MEM_POLICY,
        }
    }

    fn key_material() -> (SigningKey, std::vec::Vec<u8>) {
        let signing = SigningKey::from_slice(&[23u8; 66]).unwrap();
        let der = signing
            .verifying_key()
            .to_public_key_der()
            .unwrap()
            .into_vec();
        (signing, der)
    }

    fn booted<'a>(
        hal: &'a FakeHal,
        sink: &'a FakeSink,
        config: Config<1>,
    ) -> Supervisor<'a, FakeHal, 1> {
        let (_signing, der) = key_material();
        let supervisor = Supervisor::new(hal, config).unwrap();
        supervisor.set_event_sink(sink);
        supervisor.init(&[0x77u8; 48], &der).unwrap();
        supervisor
    }

    #[test]
    fn corrupt_store_is_cleared_and_boot_enters_recovery_arming() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        // SecureWd cause paired with a running watchdog is contradictory.
        hal.reset_cause.set(ResetCause::SecureWd as u8);
        hal.wd_status.set(1);
        hal.wd_timer_backup.set(0x4000);

        let supervisor = booted(&hal, &sink, test_config());

        // Cleared, then freshly armed: running status, non-zero backup,
        // recovery flag set, no stale cause.
        assert_eq!(supervisor.previous_cause(), ResetCause::None);
        assert_eq!(hal.wd_status.get(), 1);
        assert!(hal.wd_timer_backup.get() > 0);
        assert_ne!(hal.fwu_status.get() & fwu::AWDT_EXPIRED, 0);
        assert_eq!(hal.reset_cause.get(), 0);
        assert_eq!(hal.system_resets.get(), 0);
    }

    #[test]
    fn fresh_boot_flags_recovery_and_persists_countdown() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let supervisor = booted(&hal, &sink, test_config());

        // 3_600_000 ms at 1000 Hz is 3_600_000 ticks; the compressed
        // backup rounds up to 55.
        assert_eq!(hal.wd_timer_backup.get(), 55);
        assert_eq!(hal.wd_status.get(), 1);
        assert_ne!(hal.fwu_status.get() & fwu::AWDT_EXPIRED, 0);
        assert_eq!(supervisor.previous_cause(), ResetCause::None);
    }

    #[test]
    fn resumed_boot_halves_the_backup() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        hal.wd_status.set(1);
        hal.wd_timer_backup.set(40);
        hal.reset_cause.set(ResetCause::Request as u8);

        let supervisor = booted(&hal, &sink, test_config());

        assert_eq!(supervisor.previous_cause(), ResetCause::Request);
        assert_eq!(hal.wd_timer_backup.get(), 20);
        // Resume does not set the recovery flag.
        assert_eq!(hal.fwu_status.get() & fwu::AWDT_EXPIRED, 0);
        // The stored cause was consumed.
        assert_eq!(hal.reset_cause.get(), 0);
        // 20 << 16 ticks restored (plus the served-interval credit taken
        // back by the init tick).
        let remaining = supervisor.awdg.map(|a| a.remaining_ticks()).unwrap();
        assert_eq!(remaining, 20 << 16);
    }

    #[test]
    fn resumed_countdown_of_zero_arms_recovery_immediately() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        hal.wd_status.set(1);
        // Halves to zero: the restored watchdog expires on the init tick
        // and the grace period starts right away.
        hal.wd_timer_backup.set(1);

        let supervisor = booted(&hal, &sink, test_config());

        assert_ne!(hal.fwu_status.get() & fwu::AWDT_EXPIRED, 0);
        assert_eq!(hal.reset_cause.get(), ResetCause::SecureWd as u8);
        assert_eq!(hal.wd_timer_backup.get(), 0);
        assert_eq!(hal.wd_status.get(), 0);
        assert_eq!(
            sink.events.borrow().as_slice(),
            &[Event::Reset(ResetCause::SecureWd)]
        );
        let _ = supervisor;
    }

    #[test]
    fn functional_expiry_notifies_then_resets_after_grace() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let supervisor = booted(&hal, &sink, test_config());

        supervisor.kick_functional_watchdog(0).unwrap();

        // Reload 3 plus the served interval: three quiet ticks.
        for _ in 0..3 {
            supervisor.handle_tick_isr();
        }
        assert!(sink.events.borrow().is_empty());

        // Expiry: the grace period starts and the peer is warned.
        supervisor.handle_tick_isr();
        assert_eq!(
            sink.events.borrow().as_slice(),
            &[Event::Reset(ResetCause::FunctionalWd)]
        );
        assert_eq!(hal.system_resets.get(), 0);

        // Grace of 2 ticks, then the reset fires with the right cause.
        supervisor.handle_tick_isr();
        assert_eq!(hal.system_resets.get(), 0);
        supervisor.handle_tick_isr();
        assert_eq!(hal.system_resets.get(), 1);
        assert_eq!(hal.reset_cause.get(), ResetCause::FunctionalWd as u8);
    }

    #[test]
    fn awdg_expiry_during_functional_grace_overrides_the_cause() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let mut config = test_config();
        // Functional watchdog expires first (2 ticks + credit), the
        // authenticated one follows (4 ticks + credit) while the long
        // functional grace is still counting.
        config.functional_timeouts_ms = [2];
        config.functional_grace_ms = 1000;
        config.awdg_initial_timeout_ms = 4;
        config.awdg_grace_ms = 1000;
        let supervisor = booted(&hal, &sink, config);

        supervisor.kick_functional_watchdog(0).unwrap();

        // The init tick already consumed one AWDG interval; the functional
        // expiry lands on tick 3, the authenticated one on tick 4.
        for _ in 0..3 {
            supervisor.handle_tick_isr();
        }
        assert_eq!(
            supervisor.mirror.modified.reset_cause.get(),
            ResetCause::FunctionalWd as u8
        );

        supervisor.handle_tick_isr();
        // The recovery-relevant cause wins; both warnings went out.
        assert_eq!(
            supervisor.mirror.modified.reset_cause.get(),
            ResetCause::SecureWd as u8
        );
        assert_eq!(
            sink.events.borrow().as_slice(),
            &[
                Event::Reset(ResetCause::FunctionalWd),
                Event::Reset(ResetCause::SecureWd)
            ]
        );
    }

    #[test]
    fn functional_expiry_during_awdg_grace_does_not_downgrade_the_cause() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let mut config = test_config();
        config.functional_timeouts_ms = [4];
        config.functional_grace_ms = 1000;
        config.awdg_initial_timeout_ms = 2;
        config.awdg_grace_ms = 1000;
        let supervisor = booted(&hal, &sink, config);

        supervisor.kick_functional_watchdog(0).unwrap();

        // AWDG expires on tick 2 (one interval went to the init tick).
        supervisor.handle_tick_isr();
        supervisor.handle_tick_isr();
        assert_eq!(
            supervisor.mirror.modified.reset_cause.get(),
            ResetCause::SecureWd as u8
        );

        // Functional expiry three ticks later must not replace it.
        for _ in 0..3 {
            supervisor.handle_tick_isr();
        }
        assert_eq!(
            supervisor.mirror.modified.reset_cause.get(),
            ResetCause::SecureWd as u8
        );
    }

    #[test]
    fn awdg_backup_write_through_happens_in_the_tick() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let mut config = test_config();
        // 65_537 ticks: compressed backup starts at 2 and drops to 1 on
        // the first tick.
        config.awdg_initial_timeout_ms = 65_537;
        let supervisor = booted(&hal, &sink, config);

        assert_eq!(hal.wd_timer_backup.get(), 2);
        supervisor.handle_tick_isr();
        // Written straight from the ISR path, no main-loop sync involved.
        assert_eq!(hal.wd_timer_backup.get(), 1);
    }

    #[test]
    fn hardware_watchdog_is_kicked_on_schedule() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let supervisor = booted(&hal, &sink, test_config());

        // Reload 3: kicks on the first tick and every third after.
        supervisor.handle_tick_isr();
        assert_eq!(hal.hw_kicks.get(), 1);
        supervisor.handle_tick_isr();
        supervisor.handle_tick_isr();
        assert_eq!(hal.hw_kicks.get(), 1);
        supervisor.handle_tick_isr();
        assert_eq!(hal.hw_kicks.get(), 2);
    }

    #[test]
    fn reset_respects_priority_and_secure_cleans_watchdog_state() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let supervisor = booted(&hal, &sink, test_config());

        supervisor
            .mirror
            .modified
            .reset_cause
            .set(ResetCause::FunctionalWd.into());
        Supervisor::reset_system(&supervisor, ResetCause::Request);
        // The lower-priority request does not displace the pending cause.
        assert_eq!(hal.reset_cause.get(), ResetCause::FunctionalWd as u8);
        assert_eq!(hal.system_resets.get(), 1);

        Supervisor::reset_system(&supervisor, ResetCause::SecureWd);
        assert_eq!(hal.reset_cause.get(), ResetCause::SecureWd as u8);
        assert_eq!(hal.wd_timer_backup.get(), 0);
        assert_eq!(hal.wd_status.get(), 0);
        assert_ne!(hal.fwu_status.get() & fwu::AWDT_EXPIRED, 0);
    }

    #[test]
    fn hardware_watchdog_bailout_bypasses_the_mirrors() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let supervisor = booted(&hal, &sink, test_config());

        // Poison the mirrors; the bailout must not look at them.
        supervisor.mirror.modified.reset_cause.set(0xEE);
        hal.fwu_status.set(fwu::COMMIT);

        supervisor.handle_hardware_watchdog_isr();
        assert_eq!(hal.reset_cause.get(), ResetCause::SecureWd as u8);
        assert_eq!(hal.fwu_status.get(), fwu::COMMIT | fwu::AWDT_EXPIRED);
        assert_eq!(hal.wd_timer_backup.get(), 0);
        assert_eq!(hal.wd_status.get(), 0);
        assert_eq!(hal.system_resets.get(), 1);
    }

    #[test]
    fn allowed_memory_write_retires() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let supervisor = booted(&hal, &sink, test_config());

        supervisor.guarded_memory_write(0x4000_0010, 0xDEAD_BEEF, 4);
        assert_eq!(
            hal.raw_writes.borrow().as_slice(),
            &[(0x4000_0010, 0xDEAD_BEEF, 4)]
        );
        assert_eq!(hal.system_resets.get(), 0);
    }

    #[test]
    fn denied_memory_write_resets_with_secure_cause() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let supervisor = booted(&hal, &sink, test_config());

        // Outside every window.
        supervisor.guarded_memory_write(0x2000_0000, 1, 4);
        assert_eq!(hal.system_resets.get(), 1);
        assert_eq!(hal.reset_cause.get(), ResetCause::SecureWd as u8);
        assert!(hal.raw_writes.borrow().is_empty());

        // Inside a window but punched out by a deny entry.
        supervisor.guarded_memory_write(0x4000_0810, 1, 4);
        assert_eq!(hal.system_resets.get(), 2);
        assert!(hal.raw_writes.borrow().is_empty());
    }

    #[test]
    fn ticket_cycle_clears_recovery_flag() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let (signing, der) = key_material();
        let supervisor = Supervisor::new(&hal, test_config()).unwrap();
        supervisor.set_event_sink(&sink);
        supervisor.init(&[0x77u8; 48], &der).unwrap();

        // Fresh boot left the recovery flag set.
        assert_ne!(supervisor.fw_update_status() & fwu::AWDT_EXPIRED, 0);

        let mut nonce = [0u8; 64];
        let len = supervisor.secure_watchdog_nonce(&mut nonce).unwrap() as usize;
        assert_eq!(len, 32);

        let timeout_ms: u32 = 60_000;
        let mut message = [0u8; 36];
        message[..4].copy_from_slice(&timeout_ms.to_le_bytes());
        message[4..].copy_from_slice(&nonce[..32]);
        let digest = capsules_crypto::sha512::sha512(&message);
        let signature: Signature = signing.sign_prehash(&digest).unwrap();
        let sig_der = signature.to_der();

        let mut ticket = std::vec::Vec::new();
        ticket.extend_from_slice(&timeout_ms.to_le_bytes());
        ticket.extend_from_slice(sig_der.as_bytes());

        supervisor.secure_watchdog_ticket(&ticket).unwrap();
        assert_eq!(supervisor.fw_update_status() & fwu::AWDT_EXPIRED, 0);

        // Replays die on the rotated nonce.
        assert_eq!(
            supervisor.secure_watchdog_ticket(&ticket),
            Err(ErrorCode::SignatureInvalid)
        );
    }

    #[test]
    fn output_control_word_applies_immediately() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let supervisor = booted(&hal, &sink, test_config());

        // Set user output 0 high, SPI select 1 low, leave the rest alone.
        let control = shm::OUTPUT4_MODIFY | shm::OUTPUT4_DATA | shm::SPI_CS1_MODIFY;
        supervisor.set_outputs(control).unwrap();
        assert_eq!(hal.outputs.get(), SupervisedPin::UserOutput0.mask());

        // Unknown control bits are rejected before anything is applied.
        assert_eq!(
            supervisor.set_outputs(0x8000),
            Err(ErrorCode::InvalidArgument)
        );
    }

    #[test]
    fn rtc_set_then_get_round_trips() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let supervisor = booted(&hal, &sink, test_config());

        let target = Timestamp {
            seconds: 1_700_000_000,
            milliseconds: 250,
        };
        supervisor.set_rtc_time(target).unwrap();
        assert_eq!(supervisor.rtc_time().unwrap(), target);

        // Time moves with the counter.
        hal.counter.set(hal.counter.get() + 32768);
        let later = supervisor.rtc_time().unwrap();
        assert_eq!(later.seconds, target.seconds + 1);
    }

    #[test]
    fn input_changes_publish_once() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let supervisor = booted(&hal, &sink, test_config());

        supervisor.publish_initial_inputs();
        assert_eq!(sink.events.borrow().as_slice(), &[Event::Gpio(0)]);

        // Inputs 4 and 6 go high (bank pins 7 and 9).
        hal.inputs.set(
            SupervisedPin::UserInput0.mask() | SupervisedPin::UserInput2.mask(),
        );
        supervisor.handle_systick_isr();
        assert_eq!(
            sink.events.borrow().as_slice(),
            &[
                Event::Gpio(0),
                Event::Gpio(shm::INPUT4_DATA | shm::INPUT6_DATA)
            ]
        );

        // No change, no event.
        supervisor.handle_systick_isr();
        assert_eq!(sink.events.borrow().len(), 2);
    }

    #[test]
    fn commit_and_revert_requests_accumulate() {
        let hal = FakeHal::new();
        let sink = FakeSink::default();
        let supervisor = booted(&hal, &sink, test_config());

        supervisor.request_firmware_commit();
        supervisor.request_firmware_revert();
        let status = supervisor.fw_update_status();
        assert_ne!(status & fwu::COMMIT, 0);
        assert_ne!(status & fwu::REVERT, 0);

        // Reaches the store on the next main-loop sync.
        supervisor.sync_state_main();
        assert_ne!(hal.fwu_status.get() & fwu::COMMIT, 0);
    }
}
