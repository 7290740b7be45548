//! # Canonical ECDSA Signatures
//!
//! Every signature this crate emits is:
//!
//! 1. ECDSA over secp256k1 with an RFC 6979 deterministic nonce. Same key,
//!    same digest, same signature. No RNG at signing time.
//! 2. **Low-S.** If `s > n/2` we replace it with `n - s`. Both values verify
//!    mathematically, which is exactly the problem: a third party could flip
//!    `s` and produce a second valid signature (and a second transaction
//!    hash) for the same payload. Nodes reject high-S, so we never emit one.
//! 3. DER-encoded: `SEQUENCE { INTEGER r, INTEGER s }`.
//!
//! Verification is real verification. High-S signatures are rejected before
//! the curve math even runs.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::address::AccountAddress;
use super::hash::sha256;
use crate::config::HASH_OUTPUT_LENGTH;

/// Half the secp256k1 group order, big-endian. `s` must not exceed this.
pub const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Errors from producing or parsing signatures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signing failed")]
    SigningFailed,

    #[error("malformed DER signature")]
    InvalidDer,

    #[error("non-canonical signature: s is in the upper half of the curve order")]
    NonCanonical,

    #[error("malformed base64 signature")]
    InvalidBase64,
}

/// A canonical, DER-encoded ECDSA signature.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    der: Vec<u8>,
}

impl Signature {
    /// Normalize and encode a raw k256 signature.
    fn from_ecdsa(sig: EcdsaSignature) -> Self {
        let canonical = sig.normalize_s().unwrap_or(sig);
        Self {
            der: canonical.to_der().as_bytes().to_vec(),
        }
    }

    /// Parse a DER signature. High-S input is rejected, not silently fixed:
    /// whoever produced it is broken and should hear about it.
    pub fn from_der(bytes: &[u8]) -> Result<Self, SignatureError> {
        let sig = EcdsaSignature::from_der(bytes).map_err(|_| SignatureError::InvalidDer)?;
        if sig.normalize_s().is_some() {
            return Err(SignatureError::NonCanonical);
        }
        Ok(Self {
            der: bytes.to_vec(),
        })
    }

    /// Parse the base64 text form produced by [`to_base64`](Self::to_base64).
    pub fn from_base64(text: &str) -> Result<Self, SignatureError> {
        let bytes = BASE64
            .decode(text.trim())
            .map_err(|_| SignatureError::InvalidBase64)?;
        Self::from_der(&bytes)
    }

    /// DER bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.der
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.der)
    }

    /// The `(r, s)` scalars as fixed 32-byte big-endian arrays.
    pub fn components(&self) -> Result<([u8; 32], [u8; 32]), SignatureError> {
        let sig = self.to_ecdsa()?;
        let (r, s) = sig.split_bytes();
        Ok((r.into(), s.into()))
    }

    /// `true` when `s <= n/2`. Always true for values built by this crate.
    pub fn is_canonical(&self) -> bool {
        matches!(self.components(), Ok((_, s)) if s <= SECP256K1_HALF_ORDER)
    }

    fn to_ecdsa(&self) -> Result<EcdsaSignature, SignatureError> {
        EcdsaSignature::from_der(&self.der).map_err(|_| SignatureError::InvalidDer)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.der))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_base64(&text).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Signing & verification
// ---------------------------------------------------------------------------

/// Sign a 32-byte digest directly. The digest is not hashed again.
pub fn sign_hash(
    key: &SigningKey,
    digest: &[u8; HASH_OUTPUT_LENGTH],
) -> Result<Signature, SignatureError> {
    let sig: EcdsaSignature = key
        .sign_prehash(digest)
        .map_err(|_| SignatureError::SigningFailed)?;
    Ok(Signature::from_ecdsa(sig))
}

/// Sign `sha256(message)`.
pub fn sign_message(key: &SigningKey, message: &[u8]) -> Result<Signature, SignatureError> {
    sign_hash(key, &sha256(message))
}

/// Verify a signature over a 32-byte digest.
///
/// Returns `false` for malformed, high-S, or simply wrong signatures. We
/// don't distinguish; callers only ever want yes or no.
pub fn verify_hash(
    key: &VerifyingKey,
    digest: &[u8; HASH_OUTPUT_LENGTH],
    signature: &Signature,
) -> bool {
    let Ok(sig) = signature.to_ecdsa() else {
        return false;
    };
    if sig.normalize_s().is_some() {
        return false;
    }
    key.verify_prehash(digest, &sig).is_ok()
}

/// Verify a signature over `sha256(message)` against an account address.
pub fn verify(address: &AccountAddress, message: &[u8], signature: &Signature) -> bool {
    match address.to_verifying_key() {
        Some(key) => verify_hash(&key, &sha256(message), signature),
        None => false,
    }
}
