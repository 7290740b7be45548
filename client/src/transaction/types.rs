//! Core value types for ledger transactions.
//!
//! Small, `Copy`-friendly where possible. Hash-like values display as
//! plain base58 (no version byte), which is how the node prints them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::config::HASH_OUTPUT_LENGTH;
use crate::crypto::encoding::EncodingError;
use crate::crypto::hash::sha256;

// ---------------------------------------------------------------------------
// 32-byte identifiers
// ---------------------------------------------------------------------------

fn decode_hash(text: &str) -> Result<[u8; HASH_OUTPUT_LENGTH], EncodingError> {
    let bytes = bs58::decode(text.trim())
        .into_vec()
        .map_err(|e| EncodingError::Decoding(e.to_string()))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| EncodingError::InvalidLength {
            expected: HASH_OUTPUT_LENGTH,
            actual: bytes.len(),
        })
}

/// Identifies one ledger instance. Embedded in every transaction so a
/// signature for testnet can't be replayed on mainnet.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainIdHash([u8; HASH_OUTPUT_LENGTH]);

impl ChainIdHash {
    pub const fn from_bytes(bytes: [u8; HASH_OUTPUT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Hash of a serialized chain id, the way the node derives it.
    pub fn of(chain_id: &[u8]) -> Self {
        Self(sha256(chain_id))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_OUTPUT_LENGTH] {
        &self.0
    }

    pub fn encode(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn decode(text: &str) -> Result<Self, EncodingError> {
        decode_hash(text).map(Self)
    }
}

/// Hash of a signed transaction. What the node hands back on commit.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash([u8; HASH_OUTPUT_LENGTH]);

impl TxHash {
    pub const fn from_bytes(bytes: [u8; HASH_OUTPUT_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_OUTPUT_LENGTH] {
        &self.0
    }

    pub fn encode(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn decode(text: &str) -> Result<Self, EncodingError> {
        decode_hash(text).map(Self)
    }
}

macro_rules! impl_text_traits {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.encode())
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($ty), "({})"), self.encode())
            }
        }

        impl FromStr for $ty {
            type Err = EncodingError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::decode(s)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.encode())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                Self::decode(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_text_traits!(ChainIdHash);
impl_text_traits!(TxHash);

// ---------------------------------------------------------------------------
// TxType
// ---------------------------------------------------------------------------

/// What the transaction asks the ledger to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    /// Transfers, contract calls, deployments.
    #[default]
    Normal,
    /// Staking, voting and other system-level operations.
    Governance,
}

impl TxType {
    /// Wire tag, hashed as a little-endian `i32`.
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Normal => 0,
            Self::Governance => 1,
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Governance => write!(f, "GOVERNANCE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fee
// ---------------------------------------------------------------------------

/// Fee parameters. `limit` caps the work the transaction may consume,
/// `price` is what each unit costs, in the smallest denomination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fee {
    pub limit: u64,
    pub price: u128,
}

impl Fee {
    pub const ZERO: Fee = Fee { limit: 0, price: 0 };

    pub const fn new(limit: u64, price: u128) -> Self {
        Self { limit, price }
    }
}

/// Big-endian bytes of `value` with leading zeros stripped. Zero encodes
/// as an empty slice.
pub fn minimal_be_bytes(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}
