// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! The authenticated watchdog: a watchdog unit of one whose deferral
//! requires a signed ticket.
//!
//! A ticket is a binary blob, little-endian:
//!
//! ```text
//! | new timeout in ms (u32 LE) | ECDSA signature, ASN.1 DER |
//!  0                          3 4                 144 (max)
//! ```
//!
//! The signed message is `timeoutMs ‖ nonce` (36 bytes), hashed with
//! SHA-512 and verified against the P-521 public key handed over at init.
//! Every verification attempt consumes the nonce: a fresh one is drawn from
//! the DRBG whether or not the signature checked out, so a ticket can never
//! be replayed. If drawing a nonce ever fails the DRBG is out of requests;
//! deferral is then permanently disabled and the watchdog will run out.
//!
//! [`AuthenticatedWatchdog::tick`] and
//! [`AuthenticatedWatchdog::remaining_ticks`] may be called from the tick
//! interrupt; everything else is main-loop only, with the deferral itself
//! wrapped in a critical section by the caller (it shares the member state
//! with the tick).

use core::cell::Cell;
use kernel::utilities::cells::MapCell;
use kernel::ErrorCode;
use zeroize::Zeroize;

use capsules_crypto::ctr_drbg::{CtrDrbg, SEED_LENGTH};
use capsules_crypto::ecdsa::TicketVerifier;
use capsules_crypto::sha512::sha512;

use crate::lwdg_unit::{UnitTickOutcome, WatchdogUnit};

/// Nonce length in bytes.
pub const NONCE_LENGTH: usize = 32;
/// Leading timeout field length in bytes.
pub const TIMEOUT_LENGTH: usize = 4;
/// Signed message length: timeout plus nonce.
pub const MESSAGE_LENGTH: usize = TIMEOUT_LENGTH + NONCE_LENGTH;
/// Shortest possible ticket (4-byte timeout plus minimal DER signature).
pub const MIN_TICKET_LENGTH: usize = 10;
/// Longest accepted ticket: the timeout plus the largest DER encoding of a
/// P-521 signature (two integers of up to 67 bytes behind a long-form
/// sequence header).
pub const MAX_TICKET_LENGTH: usize = TIMEOUT_LENGTH + 141;

/// The only member id in the embedded unit.
const TIMER: u8 = 0;

/// How the watchdog came up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    /// Started fresh with the initial timeout.
    Fresh,
    /// Resumed from a saved countdown.
    Resumed,
}

pub struct AuthenticatedWatchdog {
    unit: WatchdogUnit<1>,
    verifier: MapCell<TicketVerifier>,
    drbg: MapCell<CtrDrbg>,
    nonce: Cell<[u8; NONCE_LENGTH]>,
    /// Latched by a successful verification, consumed by the next deferral.
    can_defer: Cell<bool>,
    deferral_timeout_ms: Cell<u32>,
    /// Sticky: set when the DRBG fails, permanently disabling deferral.
    rng_disabled: Cell<bool>,
}

impl AuthenticatedWatchdog {
    /// Build and start the watchdog.
    ///
    /// `rng_seed` must be exactly [`SEED_LENGTH`] bytes of external
    /// min-entropy; `public_key_der` is a DER SubjectPublicKeyInfo for the
    /// ticket signing key. With `was_running`, the countdown resumes from
    /// `saved_ticks` (the caller has already halved the persisted backup).
    ///
    /// On any failure all crypto state is dropped; the caller must force a
    /// recovery boot.
    pub fn new(
        initial_timeout_ms: u32,
        grace_period_ms: u32,
        tick_frequency_hz: u32,
        saved_ticks: u32,
        was_running: bool,
        rng_seed: &[u8],
        public_key_der: &[u8],
    ) -> Result<(AuthenticatedWatchdog, InitOutcome), ErrorCode> {
        if initial_timeout_ms == 0 {
            return Err(ErrorCode::InvalidArgument);
        }
        if rng_seed.len() != SEED_LENGTH {
            return Err(ErrorCode::InvalidArgument);
        }

        let unit: WatchdogUnit<1> = WatchdogUnit::new(grace_period_ms, tick_frequency_hz)?;
        unit.init_member(TIMER, initial_timeout_ms)?;

        let mut seed = [0u8; SEED_LENGTH];
        seed.copy_from_slice(rng_seed);
        let mut drbg = CtrDrbg::new(&seed);
        seed.zeroize();

        let verifier = TicketVerifier::from_public_key_der(public_key_der)?;

        // Fresh random initial nonce so it can not be guessed.
        let mut nonce = [0u8; NONCE_LENGTH];
        drbg.generate(&mut nonce).map_err(|_| ErrorCode::Internal)?;

        let outcome = if was_running {
            unit.change_timeout_ticks(TIMER, saved_ticks)
                .map_err(|_| ErrorCode::OutOfRange)?;
            unit.kick(TIMER)?;
            InitOutcome::Resumed
        } else {
            unit.kick(TIMER)?;
            InitOutcome::Fresh
        };

        Ok((
            AuthenticatedWatchdog {
                unit,
                verifier: MapCell::new(verifier),
                drbg: MapCell::new(drbg),
                nonce: Cell::new(nonce),
                can_defer: Cell::new(false),
                deferral_timeout_ms: Cell::new(0),
                rng_disabled: Cell::new(false),
            },
            outcome,
        ))
    }

    /// The nonce a ticket must sign. `None` once the DRBG has failed.
    ///
    /// Stable between two verification attempts; every call to
    /// [`AuthenticatedWatchdog::validate_ticket`] replaces it.
    pub fn nonce(&self) -> Option<[u8; NONCE_LENGTH]> {
        if self.rng_disabled.get() {
            None
        } else {
            Some(self.nonce.get())
        }
    }

    /// Verify a deferral ticket.
    ///
    /// On success the contained timeout is latched and one deferral is
    /// armed. Whatever the outcome, the nonce is rotated afterwards; a
    /// rotation failure permanently disables the RNG and with it all future
    /// verification.
    pub fn validate_ticket(&self, ticket: &[u8]) -> Result<(), ErrorCode> {
        self.can_defer.set(false);

        if self.rng_disabled.get() {
            return Err(ErrorCode::Internal);
        }

        let result = if ticket.len() < MIN_TICKET_LENGTH || ticket.len() > MAX_TICKET_LENGTH {
            Err(ErrorCode::InvalidArgument)
        } else {
            let mut message = [0u8; MESSAGE_LENGTH];
            message[..TIMEOUT_LENGTH].copy_from_slice(&ticket[..TIMEOUT_LENGTH]);
            message[TIMEOUT_LENGTH..].copy_from_slice(&self.nonce.get());
            let digest = sha512(&message);

            let verified = self
                .verifier
                .map(|verifier| verifier.verify_prehash(&digest, &ticket[TIMEOUT_LENGTH..]))
                .unwrap_or(false);

            if verified {
                let timeout_ms =
                    u32::from_le_bytes([ticket[0], ticket[1], ticket[2], ticket[3]]);
                self.deferral_timeout_ms.set(timeout_ms);
                self.can_defer.set(true);
                Ok(())
            } else {
                Err(ErrorCode::SignatureInvalid)
            }
        };

        // Invalidate the nonce no matter how verification went.
        let mut fresh = [0u8; NONCE_LENGTH];
        let rotated = self
            .drbg
            .map(|drbg| drbg.generate(&mut fresh))
            .unwrap_or(Err(ErrorCode::Internal));
        match rotated {
            Ok(()) => self.nonce.set(fresh),
            Err(_) => self.rng_disabled.set(true),
        }

        result
    }

    /// Perform the armed deferral: reload the timer from the ticket's
    /// timeout and kick it. Single use; the armed state is cleared whether
    /// the deferral succeeds or not.
    ///
    /// Shares the timer with the tick interrupt; callers wrap this in a
    /// critical section.
    pub fn defer(&self) -> Result<(), ErrorCode> {
        let result = if !self.can_defer.get() {
            Err(ErrorCode::SignatureInvalid)
        } else {
            match self
                .unit
                .change_timeout_ms(TIMER, self.deferral_timeout_ms.get())
            {
                Ok(()) => {
                    // A running timer can always be kicked.
                    let _ = self.unit.kick(TIMER);
                    Ok(())
                }
                Err(_) => Err(ErrorCode::OutOfRange),
            }
        };
        self.can_defer.set(false);
        result
    }

    /// Tick the embedded unit. Interrupt context.
    pub fn tick(&self) -> UnitTickOutcome {
        self.unit.tick()
    }

    /// Remaining ticks of the timer. Interrupt context.
    pub fn remaining_ticks(&self) -> u32 {
        self.unit.remaining_ticks(TIMER).unwrap_or(0)
    }

    pub fn is_rng_disabled(&self) -> bool {
        self.rng_disabled.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p521::ecdsa::signature::hazmat::PrehashSigner;
    use p521::ecdsa::{Signature, SigningKey};
    use p521::pkcs8::EncodePublicKey;

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&[11u8; 66]).unwrap()
    }

    fn public_key_der(key: &SigningKey) -> impl AsRef<[u8]> {
        key.verifying_key().to_public_key_der().unwrap()
    }

    fn make_ticket(key: &SigningKey, timeout_ms: u32, nonce: &[u8; NONCE_LENGTH]) -> ([u8; MAX_TICKET_LENGTH], usize) {
        let mut message = [0u8; MESSAGE_LENGTH];
        message[..TIMEOUT_LENGTH].copy_from_slice(&timeout_ms.to_le_bytes());
        message[TIMEOUT_LENGTH..].copy_from_slice(nonce);
        let digest = sha512(&message);
        let signature: Signature = key.sign_prehash(&digest).unwrap();
        let der = signature.to_der();

        let mut ticket = [0u8; MAX_TICKET_LENGTH];
        ticket[..TIMEOUT_LENGTH].copy_from_slice(&timeout_ms.to_le_bytes());
        ticket[TIMEOUT_LENGTH..TIMEOUT_LENGTH + der.as_bytes().len()]
            .copy_from_slice(der.as_bytes());
        (ticket, TIMEOUT_LENGTH + der.as_bytes().len())
    }

    fn fresh_awdg(key: &SigningKey) -> AuthenticatedWatchdog {
        let der = public_key_der(key);
        let (awdg, outcome) = AuthenticatedWatchdog::new(
            10,
            5,
            1000,
            0,
            false,
            &[0x5Au8; SEED_LENGTH],
            der.as_ref(),
        )
        .unwrap();
        assert_eq!(outcome, InitOutcome::Fresh);
        awdg
    }

    #[test]
    fn ticket_cycle_defers_and_rotates_nonce() {
        let key = signing_key();
        let awdg = fresh_awdg(&key);

        let nonce0 = awdg.nonce().unwrap();
        let (ticket, len) = make_ticket(&key, 20, &nonce0);

        assert!(awdg.validate_ticket(&ticket[..len]).is_ok());
        assert!(awdg.defer().is_ok());

        let nonce1 = awdg.nonce().unwrap();
        assert_ne!(nonce0, nonce1);

        // 20 ms at 1000 Hz plus the served-interval credit: 20 idle ticks,
        // then the 21st starts the grace period.
        for _ in 0..20 {
            assert_eq!(awdg.tick(), UnitTickOutcome::Idle);
        }
        assert_eq!(awdg.tick(), UnitTickOutcome::GraceStarted);
    }

    #[test]
    fn replayed_ticket_rejected() {
        let key = signing_key();
        let awdg = fresh_awdg(&key);

        let nonce0 = awdg.nonce().unwrap();
        let (ticket, len) = make_ticket(&key, 20, &nonce0);
        assert!(awdg.validate_ticket(&ticket[..len]).is_ok());
        assert!(awdg.defer().is_ok());

        // Same bytes again: the nonce has rotated underneath it.
        assert_eq!(
            awdg.validate_ticket(&ticket[..len]),
            Err(ErrorCode::SignatureInvalid)
        );
        assert_eq!(awdg.defer(), Err(ErrorCode::SignatureInvalid));
    }

    #[test]
    fn deferral_is_single_use() {
        let key = signing_key();
        let awdg = fresh_awdg(&key);

        let nonce = awdg.nonce().unwrap();
        let (ticket, len) = make_ticket(&key, 50, &nonce);
        assert!(awdg.validate_ticket(&ticket[..len]).is_ok());
        assert!(awdg.defer().is_ok());
        assert_eq!(awdg.defer(), Err(ErrorCode::SignatureInvalid));
    }

    #[test]
    fn ticket_length_bounds_enforced() {
        let key = signing_key();
        let awdg = fresh_awdg(&key);

        assert_eq!(
            awdg.validate_ticket(&[0u8; MIN_TICKET_LENGTH - 1]),
            Err(ErrorCode::InvalidArgument)
        );
        assert_eq!(
            awdg.validate_ticket(&[0u8; MAX_TICKET_LENGTH + 1]),
            Err(ErrorCode::InvalidArgument)
        );
    }

    #[test]
    fn failed_verification_still_rotates_nonce() {
        let key = signing_key();
        let awdg = fresh_awdg(&key);

        let nonce0 = awdg.nonce().unwrap();
        let garbage = [0u8; 64];
        assert_eq!(
            awdg.validate_ticket(&garbage),
            Err(ErrorCode::SignatureInvalid)
        );
        assert_ne!(awdg.nonce().unwrap(), nonce0);
    }

    #[test]
    fn tampered_timeout_field_rejected() {
        let key = signing_key();
        let awdg = fresh_awdg(&key);

        let nonce = awdg.nonce().unwrap();
        let (mut ticket, len) = make_ticket(&key, 20, &nonce);
        ticket[0] ^= 0x01; // claim a different timeout than was signed
        assert_eq!(
            awdg.validate_ticket(&ticket[..len]),
            Err(ErrorCode::SignatureInvalid)
        );
    }

    #[test]
    fn resume_uses_saved_ticks() {
        let key = signing_key();
        let der = public_key_der(&key);
        let (awdg, outcome) = AuthenticatedWatchdog::new(
            1000,
            5,
            1000,
            7,
            true,
            &[0x5Au8; SEED_LENGTH],
            der.as_ref(),
        )
        .unwrap();
        assert_eq!(outcome, InitOutcome::Resumed);
        // Saved reload of 7 plus the served-interval credit.
        assert_eq!(awdg.remaining_ticks(), 8);
    }

    #[test]
    fn bad_inputs_fail_construction() {
        let key = signing_key();
        let der = public_key_der(&key);
        let seed = [0u8; SEED_LENGTH];

        assert!(
            AuthenticatedWatchdog::new(0, 5, 1000, 0, false, &seed, der.as_ref()).is_err()
        );
        assert!(
            AuthenticatedWatchdog::new(10, 5, 0, 0, false, &seed, der.as_ref()).is_err()
        );
        assert!(
            AuthenticatedWatchdog::new(10, 5, 1000, 0, false, &seed[..47], der.as_ref())
                .is_err()
        );
        assert!(AuthenticatedWatchdog::new(10, 5, 1000, 0, false, &seed, &[0u8; 8]).is_err());
    }
}
