//! # Hashing Utilities
//!
//! SHA-256 is the only hash the ledger speaks. Transaction hashes, message
//! digests for signing, password digests and the key-derivation step of the
//! encrypted key envelope all go through here.
//!
//! Two flavors: [`sha256`] for a single buffer and [`sha256_concat`] for a
//! sequence of parts hashed as if they were concatenated, which saves the
//! allocation when the caller already has the pieces lying around.

use sha2::{Digest, Sha256};

use crate::config::HASH_OUTPUT_LENGTH;

/// Compute the SHA-256 digest of `data`.
///
/// # Example
///
/// ```
/// use nova_client::crypto::sha256;
///
/// let digest = sha256(b"nova");
/// assert_eq!(digest.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; HASH_OUTPUT_LENGTH] {
    Sha256::digest(data).into()
}

/// Compute SHA-256 over `parts` as though they were one contiguous buffer.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; HASH_OUTPUT_LENGTH] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
