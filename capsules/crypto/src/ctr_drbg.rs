// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! AES-256 CTR_DRBG (NIST SP 800-90A), no derivation function, no
//! prediction resistance.
//!
//! The supervisory core is seeded exactly once, with 48 bytes of external
//! min-entropy handed over by the bootloader, and has no entropy source of
//! its own afterwards. The instantiation therefore runs without prediction
//! resistance, and the reseed interval is `i32::MAX - 1` requests (below
//! the 2^48 the standard allows without reseeding). When the interval is
//! exhausted, [`CtrDrbg::generate`] fails permanently, which the caller
//! turns into its sticky RNG-disabled state. At one nonce per ticket
//! verification this is centuries away.
//!
//! The seed length equals the AES-256 seedlen (32-byte key + 16-byte
//! block), the case SP 800-90A permits to instantiate without a derivation
//! function.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;
use kernel::ErrorCode;
use zeroize::Zeroize;

const KEY_LENGTH: usize = 32;
const BLOCK_LENGTH: usize = 16;

/// Seed material length: AES-256 seedlen.
pub const SEED_LENGTH: usize = KEY_LENGTH + BLOCK_LENGTH;

/// Generate requests honored before the (impossible) reseed would be
/// required.
pub const RESEED_INTERVAL: u32 = i32::MAX as u32 - 1;

pub struct CtrDrbg {
    key: [u8; KEY_LENGTH],
    v: [u8; BLOCK_LENGTH],
    reseed_counter: u32,
}

impl CtrDrbg {
    /// Instantiate from a full-entropy seed. The caller owns zeroizing its
    /// copy of the seed material.
    pub fn new(seed: &[u8; SEED_LENGTH]) -> CtrDrbg {
        let mut drbg = CtrDrbg {
            key: [0; KEY_LENGTH],
            v: [0; BLOCK_LENGTH],
            reseed_counter: 1,
        };
        drbg.update(Some(seed));
        drbg
    }

    fn increment_v(&mut self) {
        for byte in self.v.iter_mut().rev() {
            let (value, carry) = byte.overflowing_add(1);
            *byte = value;
            if !carry {
                break;
            }
        }
    }

    /// CTR_DRBG_Update: run seedlen bits of counter-mode keystream, XOR in
    /// the provided data, split the result into the new key and V.
    fn update(&mut self, provided: Option<&[u8; SEED_LENGTH]>) {
        let cipher = Aes256::new(GenericArray::from_slice(&self.key));

        let mut temp = [0u8; SEED_LENGTH];
        for chunk in temp.chunks_exact_mut(BLOCK_LENGTH) {
            self.increment_v();
            let mut block = GenericArray::clone_from_slice(&self.v);
            cipher.encrypt_block(&mut block);
            chunk.copy_from_slice(block.as_slice());
        }

        if let Some(data) = provided {
            for (temp_byte, data_byte) in temp.iter_mut().zip(data.iter()) {
                *temp_byte ^= data_byte;
            }
        }

        self.key.copy_from_slice(&temp[..KEY_LENGTH]);
        self.v.copy_from_slice(&temp[KEY_LENGTH..]);
        temp.zeroize();
    }

    /// Fill `output` with pseudorandom bytes.
    ///
    /// Fails with [`ErrorCode::Internal`] once the reseed interval is
    /// exhausted; with no entropy source available the failure is permanent
    /// and the caller must treat the generator as disabled.
    pub fn generate(&mut self, output: &mut [u8]) -> Result<(), ErrorCode> {
        if self.reseed_counter > RESEED_INTERVAL {
            return Err(ErrorCode::Internal);
        }

        let cipher = Aes256::new(GenericArray::from_slice(&self.key));
        for chunk in output.chunks_mut(BLOCK_LENGTH) {
            self.increment_v();
            let mut block = GenericArray::clone_from_slice(&self.v);
            cipher.encrypt_block(&mut block);
            chunk.copy_from_slice(&block.as_slice()[..chunk.len()]);
        }

        self.update(None);
        self.reseed_counter += 1;
        Ok(())
    }
}

impl Drop for CtrDrbg {
    fn drop(&mut self) {
        self.key.zeroize();
        self.v.zeroize();
    }
}
