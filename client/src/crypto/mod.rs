//! # Cryptographic Primitives
//!
//! Everything the client needs to prove who it is:
//!
//! - **secp256k1 ECDSA** for signatures, RFC 6979 nonces, low-S, DER.
//! - **SHA-256** for transaction hashes and message digests.
//! - **AES-256-GCM** for sealing private keys under a password.
//! - **base58check** with a version byte for every text form.
//!
//! Everything here is a thin, type-safe wrapper around audited
//! implementations (`k256`, `sha2`, `aes-gcm`). If you're tempted to
//! optimize these functions, go read about timing attacks first.

pub mod address;
pub mod encoding;
pub mod encryption;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use address::AccountAddress;
pub use encoding::EncodingError;
pub use encryption::EncryptedPrivateKey;
pub use hash::sha256;
pub use keys::{KeyError, KeyPair};
pub use signatures::{verify, Signature, SignatureError};
