// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! The shared-memory RPC dispatcher.
//!
//! Runs inside the inter-core interrupt, which has the lowest priority of
//! all vectors. Per slot and signal:
//!
//! - a slot awaiting asynchronous completion is skipped (the main loop owns
//!   it);
//! - a fresh call runs its handler, publishes the result and clears
//!   `is_new` — unless the handler deferred, in which case the slot is
//!   parked until the main loop finishes it;
//! - a finished call the peer has not acknowledged re-raises the signal.
//!
//! If anything wants the peer's attention — including unacknowledged event
//! flags — the signal is re-raised at exit. This self-re-trigger is the
//! retransmit strategy: effectively the cores poll each other until the
//! acknowledgment lands, tolerated because the vector cannot starve
//! anything at its priority.
//!
//! The secure-watchdog call always takes the deferred path: a ticket
//! verification runs for seconds and must not sit inside an ISR.

use core::sync::atomic::Ordering;
use kernel::errorcode::into_retval;
use kernel::hil::intercore::InterCoreSignal;
use kernel::hil::sync::MemoryBarriers;
use kernel::ErrorCode;

use crate::awdg::MAX_TICKET_LENGTH;
use crate::reset::{constrain, ResetCause};
use crate::rpc::shm::{CallStatus, RpcSharedMemory, SECWD_MAX_MSG_SIZE};
use crate::rtc::Timestamp;

/// The supervisory operations the dispatcher forwards to.
pub trait SupervisorServices {
    fn kick_functional_watchdog(&self, id: u8) -> Result<(), ErrorCode>;

    /// Copy the current nonce into `dst`, returning its length.
    fn secure_watchdog_nonce(&self, dst: &mut [u8]) -> Result<u32, ErrorCode>;

    /// Verify a ticket and defer the authenticated watchdog.
    fn secure_watchdog_ticket(&self, ticket: &[u8]) -> Result<(), ErrorCode>;

    /// Apply a GPIO-out control word.
    fn set_outputs(&self, control: u16) -> Result<(), ErrorCode>;

    fn rtc_time(&self) -> Result<Timestamp, ErrorCode>;
    fn set_rtc_time(&self, time: Timestamp) -> Result<(), ErrorCode>;

    fn fw_update_status(&self) -> u8;
    fn previous_reset_cause(&self) -> u8;
    fn request_firmware_commit(&self);
    fn request_firmware_revert(&self);

    /// Reset the SoC. Does not return on hardware.
    fn reset_system(&self, cause: ResetCause);

    fn mcu_temperature(&self) -> f32;

    /// Perform one checked write; a policy violation resets the system with
    /// a secure-watchdog cause instead of returning.
    fn guarded_memory_write(&self, address: usize, value: u32, size: u8);
}

/// Events the supervisor pushes towards the application core.
pub trait EventSink {
    /// Announce a pending watchdog reset. Only watchdog causes are
    /// published.
    fn notify_reset(&self, cause: ResetCause);

    /// Publish a changed debounced input state.
    fn notify_gpio_change(&self, inputs: u8);
}

pub struct RpcServer<'a, S: SupervisorServices, P: InterCoreSignal + MemoryBarriers> {
    shm: &'a RpcSharedMemory,
    services: &'a S,
    signal: &'a P,
}

impl<'a, S: SupervisorServices, P: InterCoreSignal + MemoryBarriers> RpcServer<'a, S, P> {
    pub fn new(
        shm: &'a RpcSharedMemory,
        services: &'a S,
        signal: &'a P,
    ) -> RpcServer<'a, S, P> {
        RpcServer {
            shm,
            services,
            signal,
        }
    }

    /// One slot's state machine. `handler` returns the result and whether
    /// completion is deferred to the main loop; a failing handler always
    /// returns synchronously.
    fn process_call<F>(&self, status: &CallStatus, trigger_peer: bool, handler: F) -> bool
    where
        F: FnOnce() -> (Result<(), ErrorCode>, bool),
    {
        if status.await_async_completion.load(Ordering::Acquire) {
            // Deliberately no re-trigger either: the signal would fire
            // forever while the main loop works.
            return false;
        }

        if status.is_new.load(Ordering::Acquire) {
            let (result, deferred) = handler();
            status.retval.set(into_retval(result));
            // The result must retire before the peer sees the flag flip.
            self.signal.data_memory_barrier();
            if !deferred || result.is_err() {
                status.is_new.store(false, Ordering::Release);
                trigger_peer
            } else {
                status.await_async_completion.store(true, Ordering::Release);
                false
            }
        } else if !status.is_processed.load(Ordering::Acquire) {
            // The peer missed (or has not yet handled) the completion
            // signal; nudge again.
            trigger_peer
        } else {
            false
        }
    }

    /// Service every slot. Call from the inter-core interrupt handler.
    pub fn handle_intercore_interrupt(&self) {
        let shm = self.shm;
        let mut send_trigger = false;

        // Verification takes seconds; park the slot for the main loop.
        send_trigger |= self.process_call(&shm.sec_wd.status, true, || (Ok(()), true));

        send_trigger |= self.process_call(&shm.func_wd.status, true, || {
            let id = shm.func_wd.watchdog_id.get();
            (self.services.kick_functional_watchdog(id), false)
        });

        send_trigger |= self.process_call(&shm.gpio_out.status, true, || {
            let control = shm.gpio_out.gpio_state.get();
            (self.services.set_outputs(control), false)
        });

        send_trigger |= self.process_call(&shm.rtc.status, true, || {
            if shm.rtc.is_set_not_get.get() != 0 {
                let time = Timestamp {
                    seconds: shm.rtc.seconds.get(),
                    milliseconds: shm.rtc.milliseconds.get(),
                };
                (self.services.set_rtc_time(time), false)
            } else {
                match self.services.rtc_time() {
                    Ok(time) => {
                        shm.rtc.seconds.set(time.seconds);
                        shm.rtc.milliseconds.set(time.milliseconds);
                        (Ok(()), false)
                    }
                    Err(e) => (Err(e), false),
                }
            }
        });

        send_trigger |= self.process_call(&shm.fw_update.status, true, || {
            let slot = &shm.fw_update;
            if slot.is_read_not_write.get() != 0 {
                if slot.is_status_bits_not_reset_cause.get() != 0 {
                    slot.fw_status.set(self.services.fw_update_status());
                } else {
                    slot.reset_cause.set(self.services.previous_reset_cause());
                }
            } else if slot.is_commit_not_revert.get() != 0 {
                self.services.request_firmware_commit();
            } else {
                self.services.request_firmware_revert();
            }
            (Ok(()), false)
        });

        send_trigger |= self.process_call(&shm.reset.status, true, || {
            // Unknown causes still reset, just fail-closed into recovery.
            self.services.reset_system(constrain(shm.reset.cause.get()));
            // Reached only if the reset did not take effect.
            (Err(ErrorCode::Fail), false)
        });

        send_trigger |= self.process_call(&shm.mcu_temp.status, true, || {
            shm.mcu_temp.temperature.set(self.services.mcu_temperature());
            (Ok(()), false)
        });

        // The peer polls for the memory-write result, no trigger needed.
        send_trigger |= self.process_call(&shm.mem_write.status, false, || {
            (self.handle_mem_write(), false)
        });

        // Unconsumed events keep the retransmit going too.
        send_trigger |= !shm.events.is_reset_processed.load(Ordering::Acquire);
        send_trigger |= !shm.events.is_gpio_processed.load(Ordering::Acquire);

        if send_trigger {
            // Already in the signal's own interrupt; no masking needed.
            self.signal.trigger();
        }
    }

    fn handle_mem_write(&self) -> Result<(), ErrorCode> {
        let slot = &self.shm.mem_write;

        // Latch everything; the peer could rewrite the slot mid-handling.
        let base = slot.base_address.get() as usize;
        let size = slot.access_size.get();
        let words = slot.data_words.get() as usize;

        if size < 4 {
            // Sub-word writes carry exactly one value.
            if words == 1 {
                let value = slot.data[0].get();
                self.services.guarded_memory_write(base, value, size);
            } else {
                self.services.reset_system(ResetCause::SecureWd);
            }
        } else if size == 4 {
            if words > slot.data.len() {
                self.services.reset_system(ResetCause::SecureWd);
            } else {
                for (index, cell) in slot.data.iter().take(words).enumerate() {
                    self.services
                        .guarded_memory_write(base + index * 4, cell.get(), 4);
                }
            }
        } else {
            self.services.reset_system(ResetCause::SecureWd);
        }

        // The writes must have retired before the peer regains control.
        self.signal.data_synchronization_barrier();
        Ok(())
    }

    /// True while the secure-watchdog slot waits for the main loop.
    pub fn has_pending_secure_watchdog(&self) -> bool {
        self.shm
            .sec_wd
            .status
            .await_async_completion
            .load(Ordering::Acquire)
    }

    /// Main-loop half of the secure-watchdog call: run the (long) nonce or
    /// ticket operation if one is parked. Returns its result.
    ///
    /// Not reentrant; must not run concurrently with anything else touching
    /// the authenticated watchdog.
    pub fn process_pending_secure_watchdog(&self) -> Option<Result<(), ErrorCode>> {
        if !self.has_pending_secure_watchdog() {
            return None;
        }
        let slot = &self.shm.sec_wd;

        let result = if slot.is_nonce_not_kick.get() != 0 {
            let mut nonce = [0u8; SECWD_MAX_MSG_SIZE];
            match self.services.secure_watchdog_nonce(&mut nonce) {
                Ok(len) => {
                    slot.write_data(&nonce[..len as usize]);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        } else {
            // Latch the length before copying, or a racing peer could grow
            // it under us into an over-read.
            let len = slot.data_len.get() as usize;
            if len > MAX_TICKET_LENGTH {
                Err(ErrorCode::InvalidArgument)
            } else {
                let mut ticket = [0u8; MAX_TICKET_LENGTH];
                slot.read_data(&mut ticket[..len]);
                self.services.secure_watchdog_ticket(&ticket[..len])
            }
        };

        Some(result)
    }

    /// Publish the result of a deferred secure-watchdog call and wake the
    /// peer.
    ///
    /// The signal interrupt is masked across the flag updates: were an
    /// event to fire between clearing `await_async_completion` and
    /// `is_new`, the dispatcher would see the call as fresh and run it a
    /// second time.
    ///
    /// Callers serialize this against the other emitters (critical
    /// section).
    pub fn finish_secure_watchdog(&self, result: Result<(), ErrorCode>) {
        let status = &self.shm.sec_wd.status;
        if !status.await_async_completion.load(Ordering::Acquire) {
            return;
        }

        status.retval.set(into_retval(result));

        self.signal.disable();
        status.await_async_completion.store(false, Ordering::Release);
        self.signal.data_memory_barrier();
        status.is_new.store(false, Ordering::Release);
        self.signal.trigger();
        self.signal.enable();
    }
}

impl<S: SupervisorServices, P: InterCoreSignal + MemoryBarriers> EventSink
    for RpcServer<'_, S, P>
{
    fn notify_reset(&self, cause: ResetCause) {
        // Only the watchdog causes are meaningful as events.
        if cause != ResetCause::FunctionalWd && cause != ResetCause::SecureWd {
            return;
        }
        self.shm
            .events
            .reset_cause
            .store(cause as u8, Ordering::Relaxed);
        self.signal.data_memory_barrier();
        self.shm
            .events
            .is_reset_processed
            .store(false, Ordering::Release);
        self.signal.trigger();
    }

    fn notify_gpio_change(&self, inputs: u8) {
        self.shm.events.gpio_state.store(inputs, Ordering::Relaxed);
        self.signal.data_memory_barrier();
        self.shm
            .events
            .is_gpio_processed
            .store(false, Ordering::Release);
        self.signal.trigger();
    }
}
