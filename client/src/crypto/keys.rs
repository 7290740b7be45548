//! # Key Management
//!
//! secp256k1 keypairs: the identity behind every account on the ledger.
//!
//! A [`KeyPair`] owns a private scalar and knows its own
//! [`AccountAddress`], derived once at construction. It can sign digests
//! and messages, verify signatures, and move in and out of the process in
//! three forms:
//!
//! - raw big-endian scalar bytes ([`KeyPair::from_bytes`] / [`KeyPair::to_bytes`]),
//! - versioned base58check text ([`KeyPair::decode`] / [`KeyPair::encode`]),
//! - a password-sealed envelope ([`KeyPair::import`] / [`KeyPair::export`]).
//!
//! ## Security considerations
//!
//! - The scalar lives inside k256's `SigningKey`, which zeroizes on drop.
//!   Every copy we make on the way in or out is wrapped in `Zeroizing`.
//! - Key bytes are never logged and never appear in `Debug` output.
//! - Generation uses `OsRng`.

use std::fmt;

use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

use super::address::AccountAddress;
use super::encoding::{decode_versioned_exact, encode_versioned, EncodingError};
use super::encryption::{EncryptedPrivateKey, EncryptionError};
use super::hash::sha256;
use super::signatures::{self, Signature, SignatureError};
use crate::config::{HASH_OUTPUT_LENGTH, PRIVATE_KEY_LENGTH, PRIVATE_KEY_VERSION};

/// Errors that can occur during key operations.
///
/// Deliberately vague about *why* a scalar was rejected. Error messages are
/// not the place to describe key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid private key: wrong length or not a valid secp256k1 scalar")]
    InvalidSecretKey,

    #[error(transparent)]
    Decoding(#[from] EncodingError),

    #[error("authentication failed: wrong password or corrupted key envelope")]
    Authentication,

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// A secp256k1 keypair bound to its account address.
///
/// `KeyPair` intentionally does NOT implement `Serialize`/`Deserialize` or
/// `Clone`. Duplicating a private key should be a conscious act; use
/// [`to_bytes`](Self::to_bytes) and [`from_bytes`](Self::from_bytes).
///
/// # Examples
///
/// ```
/// use nova_client::crypto::KeyPair;
///
/// let kp = KeyPair::generate();
/// let sig = kp.sign(b"send 100 to alice").unwrap();
/// assert!(kp.verify(b"send 100 to alice", &sig));
/// ```
pub struct KeyPair {
    signing_key: SigningKey,
    address: AccountAddress,
}

impl KeyPair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = AccountAddress::from_verifying_key(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// Recover a keypair from a raw big-endian scalar.
    ///
    /// Accepts 1 to 32 bytes; shorter inputs are left-padded with zeros,
    /// since minimal big-endian encodings drop leading zero bytes. Zero and
    /// values `>= n` are rejected.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, KeyError> {
        if raw.is_empty() || raw.len() > PRIVATE_KEY_LENGTH {
            return Err(KeyError::InvalidSecretKey);
        }

        let mut padded = Zeroizing::new([0u8; PRIVATE_KEY_LENGTH]);
        padded[PRIVATE_KEY_LENGTH - raw.len()..].copy_from_slice(raw);

        let signing_key = SigningKey::from_bytes((&*padded).into())
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Parse the versioned text form produced by [`encode`](Self::encode).
    ///
    /// A value carrying any other version byte (an address, an encrypted
    /// envelope) fails with [`EncodingError::VersionMismatch`]. The payload
    /// must be exactly 32 bytes; no padding on this path.
    pub fn decode(text: &str) -> Result<Self, KeyError> {
        let raw = Zeroizing::new(decode_versioned_exact(
            PRIVATE_KEY_VERSION,
            PRIVATE_KEY_LENGTH,
            text,
        )?);
        Self::from_bytes(&raw)
    }

    /// Unseal a password-encrypted key.
    pub fn import(encrypted: &EncryptedPrivateKey, password: &[u8]) -> Result<Self, KeyError> {
        let raw = encrypted.open(password).map_err(|e| match e {
            EncryptionError::DecryptFailed => KeyError::Authentication,
            other => KeyError::Encryption(other),
        })?;
        Self::from_bytes(&raw)
    }

    /// The account address. Computed once; always 33 bytes.
    pub fn address(&self) -> AccountAddress {
        self.address
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Borrow the k256 signing key. Keep the borrow short.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Raw 32-byte big-endian scalar.
    ///
    /// **Handle with care.** The returned buffer zeroizes itself on drop;
    /// don't copy it out of there.
    pub fn to_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_LENGTH]> {
        let mut raw = Zeroizing::new([0u8; PRIVATE_KEY_LENGTH]);
        raw.copy_from_slice(&self.signing_key.to_bytes());
        raw
    }

    /// Versioned base58check text of the raw scalar. This is a plaintext
    /// secret; prefer [`export`](Self::export) for anything that persists.
    pub fn encode(&self) -> String {
        encode_versioned(PRIVATE_KEY_VERSION, self.to_bytes().as_slice())
    }

    /// Seal the scalar under `password`.
    pub fn export(&self, password: &[u8]) -> Result<EncryptedPrivateKey, KeyError> {
        Ok(EncryptedPrivateKey::seal(self.to_bytes().as_slice(), password)?)
    }

    /// Sign a 32-byte digest as-is. Low-S, DER-encoded.
    pub fn sign_hash(&self, digest: &[u8; HASH_OUTPUT_LENGTH]) -> Result<Signature, KeyError> {
        Ok(signatures::sign_hash(&self.signing_key, digest)?)
    }

    /// Sign `sha256(message)`.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, KeyError> {
        self.sign_hash(&sha256(message))
    }

    /// Verify a signature over `sha256(message)` with this key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        signatures::verify_hash(self.verifying_key(), &sha256(message), signature)
    }

    /// Verify a signature over a 32-byte digest with this key.
    pub fn verify_hash(&self, digest: &[u8; HASH_OUTPUT_LENGTH], signature: &Signature) -> bool {
        signatures::verify_hash(self.verifying_key(), digest, signature)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material, not even partially.
        write!(f, "KeyPair(address={})", self.address)
    }
}

impl PartialEq for KeyPair {
    /// Compared by address. Comparing secrets in non-constant time is a
    /// habit worth not having.
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for KeyPair {}
