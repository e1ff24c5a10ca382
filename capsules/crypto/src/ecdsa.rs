// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! ECDSA P-521 ticket-signature verification.
//!
//! The deferral ticket carries an ASN.1 DER signature over the SHA-512
//! digest of `timeoutMs ‖ nonce`; the public key arrives once from the
//! bootloader as a DER SubjectPublicKeyInfo. Parsing through the curve
//! crate enforces both requirements on the key — the algorithm must be
//! id-ecPublicKey and the named curve must match — so a key for any other
//! curve or algorithm is rejected at init.

use kernel::ErrorCode;
use p521::ecdsa;
use p521::ecdsa::signature::hazmat::PrehashVerifier;
use p521::pkcs8::DecodePublicKey;
use p521::PublicKey;

use crate::sha512::DIGEST_LENGTH;

/// A parsed, validated ticket-verification key.
pub struct TicketVerifier {
    key: ecdsa::VerifyingKey,
}

impl TicketVerifier {
    /// Parse a DER SubjectPublicKeyInfo blob.
    pub fn from_public_key_der(der: &[u8]) -> Result<TicketVerifier, ErrorCode> {
        let public_key =
            PublicKey::from_public_key_der(der).map_err(|_| ErrorCode::InvalidArgument)?;
        ecdsa::VerifyingKey::from_affine(*public_key.as_affine())
            .map(|key| TicketVerifier { key })
            .map_err(|_| ErrorCode::InvalidArgument)
    }

    /// Check a DER-encoded signature against a precomputed SHA-512 digest.
    ///
    /// Returns `false` for both malformed and non-verifying signatures; the
    /// caller does not distinguish the two.
    pub fn verify_prehash(&self, digest: &[u8; DIGEST_LENGTH], signature_der: &[u8]) -> bool {
        match ecdsa::Signature::from_der(signature_der) {
            Ok(signature) => self.key.verify_prehash(digest, &signature).is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sha512::sha512;
    use p521::ecdsa::signature::hazmat::PrehashSigner;
    use p521::ecdsa::{Signature, SigningKey, VerifyingKey};
    use p521::pkcs8::EncodePublicKey;

    fn test_key() -> (SigningKey, TicketVerifier) {
        // Deterministic key so the test is reproducible.
        let signing = SigningKey::from_slice(&[7u8; 66]).unwrap();
        let spki = VerifyingKey::from(&signing)
            .to_public_key_der()
            .unwrap();
        let verifier = TicketVerifier::from_public_key_der(spki.as_bytes()).unwrap();
        (signing, verifier)
    }

    #[test]
    fn valid_signature_verifies() {
        let (signing, verifier) = test_key();
        let digest = sha512(b"message under test");
        let signature: Signature = signing.sign_prehash(&digest).unwrap();
        let der = signature.to_der();
        assert!(verifier.verify_prehash(&digest, der.as_bytes()));
    }

    #[test]
    fn wrong_digest_rejected() {
        let (signing, verifier) = test_key();
        let digest = sha512(b"message under test");
        let signature: Signature = signing.sign_prehash(&digest).unwrap();
        let der = signature.to_der();
        let other = sha512(b"another message");
        assert!(!verifier.verify_prehash(&other, der.as_bytes()));
    }

    #[test]
    fn garbage_signature_rejected() {
        let (_signing, verifier) = test_key();
        let digest = sha512(b"message under test");
        assert!(!verifier.verify_prehash(&digest, &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]));
        assert!(!verifier.verify_prehash(&digest, b"not a signature"));
    }

    #[test]
    fn truncated_key_rejected() {
        let signing = SigningKey::from_slice(&[9u8; 66]).unwrap();
        let spki = VerifyingKey::from(&signing).to_public_key_der().unwrap();
        let der = spki.as_bytes();
        assert!(TicketVerifier::from_public_key_der(&der[..der.len() - 4]).is_err());
        assert!(TicketVerifier::from_public_key_der(&[]).is_err());
    }
}
