//! # Account Addresses
//!
//! An account address is the SEC1-compressed secp256k1 public key: one
//! parity byte (`0x02` when Y is even, `0x03` when odd) followed by the
//! 32-byte big-endian X coordinate. 33 bytes, always. There is no hashing
//! step; the address *is* the public key, so a verifier can check a
//! signature against an address without any extra lookup.
//!
//! Text form is `base58check(0x42 || address)`.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::encoding::{decode_versioned_exact, encode_versioned, EncodingError};
use crate::config::{ACCOUNT_ADDRESS_LENGTH, ACCOUNT_ADDRESS_VERSION};

const EVEN_Y_PREFIX: u8 = 0x02;
const ODD_Y_PREFIX: u8 = 0x03;

/// A 33-byte account address derived from a secp256k1 public key.
///
/// Equality, ordering and hashing are byte-wise. Addresses are `Copy`;
/// pass them around freely.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountAddress([u8; ACCOUNT_ADDRESS_LENGTH]);

impl AccountAddress {
    /// Derive the address of a public key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.as_affine().to_encoded_point(false);
        let mut bytes = [0u8; ACCOUNT_ADDRESS_LENGTH];

        // A VerifyingKey is never the identity, so both coordinates exist.
        if let (Some(x), Some(y)) = (point.x(), point.y()) {
            bytes[0] = if y[y.len() - 1] & 1 == 0 {
                EVEN_Y_PREFIX
            } else {
                ODD_Y_PREFIX
            };
            bytes[1..].copy_from_slice(x);
        }
        Self(bytes)
    }

    /// Build an address from raw bytes, checking the length, the parity
    /// prefix and that the bytes decompress to a point on the curve.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, EncodingError> {
        let bytes: [u8; ACCOUNT_ADDRESS_LENGTH] =
            slice.try_into().map_err(|_| EncodingError::InvalidLength {
                expected: ACCOUNT_ADDRESS_LENGTH,
                actual: slice.len(),
            })?;

        if bytes[0] != EVEN_Y_PREFIX && bytes[0] != ODD_Y_PREFIX {
            return Err(EncodingError::Decoding(format!(
                "invalid parity prefix 0x{:02x}",
                bytes[0]
            )));
        }
        VerifyingKey::from_sec1_bytes(&bytes)
            .map_err(|_| EncodingError::Decoding("not a point on secp256k1".into()))?;

        Ok(Self(bytes))
    }

    /// Recover the public key behind this address.
    pub fn to_verifying_key(&self) -> Option<VerifyingKey> {
        VerifyingKey::from_sec1_bytes(&self.0).ok()
    }

    /// Raw 33 bytes.
    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ADDRESS_LENGTH] {
        &self.0
    }

    /// Versioned base58check text form.
    pub fn encode(&self) -> String {
        encode_versioned(ACCOUNT_ADDRESS_VERSION, &self.0)
    }

    /// Parse the text form produced by [`encode`](Self::encode).
    pub fn decode(text: &str) -> Result<Self, EncodingError> {
        let raw = decode_versioned_exact(ACCOUNT_ADDRESS_VERSION, ACCOUNT_ADDRESS_LENGTH, text)?;
        Self::try_from_slice(&raw)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({})", self.encode())
    }
}

impl FromStr for AccountAddress {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl AsRef<[u8]> for AccountAddress {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for AccountAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::decode(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;

    #[test]
    fn test_address_is_compressed_public_key() {
        let kp = KeyPair::generate();
        let sec1 = kp.verifying_key().to_sec1_bytes();
        assert_eq!(kp.address().as_bytes().as_slice(), &*sec1);
    }

    #[test]
    fn test_parity_prefix_follows_y() {
        for _ in 0..32 {
            let kp = KeyPair::generate();
            let point = kp.verifying_key().as_affine().to_encoded_point(false);
            let y = point.y().unwrap();
            let expected = if y[31] & 1 == 0 { 0x02 } else { 0x03 };
            assert_eq!(kp.address().as_bytes()[0], expected);
            assert_eq!(&kp.address().as_bytes()[1..], point.x().unwrap().as_slice());
        }
    }

    #[test]
    fn test_text_roundtrip() {
        let address = KeyPair::generate().address();
        let text = address.encode();
        assert_eq!(AccountAddress::decode(&text).unwrap(), address);
        assert_eq!(text.parse::<AccountAddress>().unwrap(), address);
    }

    #[test]
    fn test_decode_rejects_private_key_text() {
        let kp = KeyPair::generate();
        let err = AccountAddress::decode(&kp.encode()).unwrap_err();
        assert!(matches!(err, EncodingError::VersionMismatch { .. }));
    }

    #[test]
    fn test_try_from_slice_rejects_bad_prefix() {
        let mut bytes = *KeyPair::generate().address().as_bytes();
        bytes[0] = 0x04;
        assert!(matches!(
            AccountAddress::try_from_slice(&bytes),
            Err(EncodingError::Decoding(_))
        ));
    }

    #[test]
    fn test_try_from_slice_rejects_short_input() {
        assert_eq!(
            AccountAddress::try_from_slice(&[0x02; 32]).unwrap_err(),
            EncodingError::InvalidLength {
                expected: 33,
                actual: 32
            }
        );
    }

    #[test]
    fn test_serde_uses_text_form() {
        let address = KeyPair::generate().address();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", address.encode()));
        let back: AccountAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
