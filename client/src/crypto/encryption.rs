//! # Password-Sealed Private Keys
//!
//! AES-256-GCM, used for one job: sealing a private scalar under a
//! password so it can sit in a key store (or be exported to a user) without
//! being a plaintext liability.
//!
//! ## Key derivation
//!
//! ```text
//! digest = sha256(password)
//! key    = sha256(password || digest)
//! ```
//!
//! ## Wire format
//!
//! [`seal`] returns `nonce || ciphertext` where the nonce is 12 random bytes
//! and the ciphertext carries the 16-byte GCM tag. The text form of an
//! [`EncryptedPrivateKey`] wraps that with version byte `0xAA`.
//!
//! A wrong password and a corrupted envelope look identical on purpose:
//! both are [`EncryptionError::DecryptFailed`].

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use zeroize::Zeroizing;

use super::encoding::{decode_versioned, encode_versioned, EncodingError};
use super::hash::{sha256, sha256_concat};
use crate::config::{
    AES_KEY_LENGTH, AES_NONCE_LENGTH, AES_TAG_LENGTH, ENCRYPTED_PRIVATE_KEY_VERSION,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong password or corrupted ciphertext")]
    DecryptFailed,

    #[error("ciphertext too short: must be at least {} bytes", AES_NONCE_LENGTH + AES_TAG_LENGTH)]
    CiphertextTooShort,
}

/// Derive the AES key for `password`.
pub fn derive_key(password: &[u8]) -> Zeroizing<[u8; AES_KEY_LENGTH]> {
    let digest = Zeroizing::new(sha256(password));
    Zeroizing::new(sha256_concat(&[password, digest.as_slice()]))
}

/// Encrypt `plaintext` under `password` with a fresh random nonce.
pub fn seal(password: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let key = derive_key(password);
    let cipher =
        Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut out = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt data produced by [`seal`].
pub fn open(password: &[u8], sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, EncryptionError> {
    if sealed.len() < AES_NONCE_LENGTH + AES_TAG_LENGTH {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(AES_NONCE_LENGTH);
    let key = derive_key(password);
    let cipher =
        Aes256Gcm::new_from_slice(key.as_slice()).map_err(|_| EncryptionError::DecryptFailed)?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| EncryptionError::DecryptFailed)
}

// ---------------------------------------------------------------------------
// EncryptedPrivateKey
// ---------------------------------------------------------------------------

/// A private scalar sealed under a password.
///
/// Safe to store and to print; without the password it is just noise.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedPrivateKey {
    sealed: Vec<u8>,
}

impl EncryptedPrivateKey {
    /// Seal raw private key bytes.
    pub fn seal(raw_key: &[u8], password: &[u8]) -> Result<Self, EncryptionError> {
        Ok(Self {
            sealed: seal(password, raw_key)?,
        })
    }

    /// Recover the raw private key bytes.
    pub fn open(&self, password: &[u8]) -> Result<Zeroizing<Vec<u8>>, EncryptionError> {
        open(password, &self.sealed)
    }

    /// `nonce || ciphertext`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.sealed
    }

    pub fn from_bytes(sealed: Vec<u8>) -> Self {
        Self { sealed }
    }

    pub fn encode(&self) -> String {
        encode_versioned(ENCRYPTED_PRIVATE_KEY_VERSION, &self.sealed)
    }

    pub fn decode(text: &str) -> Result<Self, EncodingError> {
        let sealed = decode_versioned(ENCRYPTED_PRIVATE_KEY_VERSION, text)?;
        if sealed.len() < AES_NONCE_LENGTH + AES_TAG_LENGTH {
            return Err(EncodingError::InvalidLength {
                expected: AES_NONCE_LENGTH + AES_TAG_LENGTH,
                actual: sealed.len(),
            });
        }
        Ok(Self { sealed })
    }
}

impl fmt::Display for EncryptedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for EncryptedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedPrivateKey({} bytes)", self.sealed.len())
    }
}

impl FromStr for EncryptedPrivateKey {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for EncryptedPrivateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for EncryptedPrivateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::decode(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let sealed = seal(b"hunter2", b"private scalar bytes").unwrap();
        let opened = open(b"hunter2", &sealed).unwrap();
        assert_eq!(opened.as_slice(), b"private scalar bytes");
    }

    #[test]
    fn test_wrong_password_fails() {
        let sealed = seal(b"right", b"secret").unwrap();
        assert_eq!(
            open(b"wrong", &sealed).unwrap_err(),
            EncryptionError::DecryptFailed
        );
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let mut sealed = seal(b"pw", b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert_eq!(
            open(b"pw", &sealed).unwrap_err(),
            EncryptionError::DecryptFailed
        );
    }

    #[test]
    fn test_short_input_rejected() {
        assert_eq!(
            open(b"pw", &[0u8; 10]).unwrap_err(),
            EncryptionError::CiphertextTooShort
        );
    }

    #[test]
    fn test_nonces_are_fresh() {
        let a = seal(b"pw", b"same").unwrap();
        let b = seal(b"pw", b"same").unwrap();
        assert_ne!(a[..AES_NONCE_LENGTH], b[..AES_NONCE_LENGTH]);
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        assert_eq!(*derive_key(b"pw"), *derive_key(b"pw"));
        assert_ne!(*derive_key(b"pw"), *derive_key(b"pw2"));
    }

    #[test]
    fn test_envelope_text_roundtrip() {
        let key = EncryptedPrivateKey::seal(&[5u8; 32], b"pw").unwrap();
        let text = key.encode();
        let back: EncryptedPrivateKey = text.parse().unwrap();
        assert_eq!(back, key);
        assert_eq!(back.open(b"pw").unwrap().as_slice(), &[5u8; 32]);
    }

    #[test]
    fn test_envelope_rejects_address_version() {
        let text = encode_versioned(0x42, &[0u8; 40]);
        assert!(matches!(
            EncryptedPrivateKey::decode(&text),
            Err(EncodingError::VersionMismatch { .. })
        ));
    }
}
