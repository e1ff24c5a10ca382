// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! SHA-512 one-shot digest.

use sha2::{Digest, Sha512};

pub const DIGEST_LENGTH: usize = 64;

/// Hash `data` in one pass.
pub fn sha512(data: &[u8]) -> [u8; DIGEST_LENGTH] {
    let mut hasher = Sha512::new();
    hasher.update(data);
    let mut digest = [0u8; DIGEST_LENGTH];
    digest.copy_from_slice(hasher.finalize().as_slice());
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_abc_digest_lengths_differ_in_content() {
        let empty = sha512(b"");
        let abc = sha512(b"abc");
        assert_ne!(empty, abc);
        // FIPS 180-2 appendix C example, leading bytes of SHA-512("abc").
        assert_eq!(&abc[..8], &[0xdd, 0xaf, 0x35, 0xa1, 0x93, 0x61, 0x7a, 0xba]);
    }
}
