//! # Versioned Text Encoding
//!
//! Every value that leaves the process as text (addresses, private keys,
//! encrypted key envelopes) uses the same envelope:
//!
//! ```text
//! base58check( version_byte || raw_bytes )
//! ```
//!
//! The version byte tells you *what* you're holding. Feeding an address into
//! a private-key decoder fails loudly with [`EncodingError::VersionMismatch`]
//! instead of producing a garbage key. The 4-byte checksum catches typos
//! before they turn into lost funds.

use thiserror::Error;
use zeroize::Zeroizing;

/// Errors from decoding a versioned text value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Not valid base58, bad checksum, or an empty payload.
    #[error("malformed encoded value: {0}")]
    Decoding(String),

    /// Well-formed envelope carrying the wrong kind of value.
    #[error("version mismatch: expected 0x{expected:02x}, found 0x{actual:02x}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// Right version, wrong number of payload bytes.
    #[error("invalid length: expected {expected} bytes, found {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Wrap `raw` with `version` and encode as base58check.
///
/// The intermediate buffer is zeroized on return, since callers use this
/// for private key material too.
pub fn encode_versioned(version: u8, raw: &[u8]) -> String {
    let mut buf = Zeroizing::new(Vec::with_capacity(1 + raw.len()));
    buf.push(version);
    buf.extend_from_slice(raw);
    bs58::encode(buf.as_slice()).with_check().into_string()
}

/// Decode a base58check envelope and strip the version byte.
///
/// Fails with [`EncodingError::VersionMismatch`] when the leading byte is
/// not `expected`.
pub fn decode_versioned(expected: u8, text: &str) -> Result<Vec<u8>, EncodingError> {
    let mut bytes = bs58::decode(text.trim())
        .with_check(None)
        .into_vec()
        .map_err(|e| EncodingError::Decoding(e.to_string()))?;

    let actual = *bytes
        .first()
        .ok_or_else(|| EncodingError::Decoding("empty payload".into()))?;
    if actual != expected {
        return Err(EncodingError::VersionMismatch { expected, actual });
    }

    bytes.remove(0);
    Ok(bytes)
}

/// Same as [`decode_versioned`] but also pins the payload length.
pub fn decode_versioned_exact(
    expected: u8,
    length: usize,
    text: &str,
) -> Result<Vec<u8>, EncodingError> {
    let raw = decode_versioned(expected, text)?;
    if raw.len() != length {
        return Err(EncodingError::InvalidLength {
            expected: length,
            actual: raw.len(),
        });
    }
    Ok(raw)
}
