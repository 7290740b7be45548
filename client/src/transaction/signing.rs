//! Transaction signing.
//!
//! Signing is a separate step from building because the key may not be
//! in this process at all (see the remote signer). What gets signed is
//! [`RawTransaction::hash`], the SHA-256 of the canonical field layout;
//! the resulting [`SignedTransaction`] hashes that same content plus the
//! signature to get its ledger identity.

use serde::Serialize;

use super::builder::RawTransaction;
use super::types::TxHash;
use crate::crypto::keys::{KeyError, KeyPair};
use crate::crypto::signatures::{verify_hash, Signature};

/// A raw transaction plus its signature and the derived hash.
///
/// The hash is computed at construction and cannot drift from the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedTransaction {
    raw: RawTransaction,
    signature: Signature,
    hash: TxHash,
}

impl SignedTransaction {
    /// Attach `signature` to `raw`. Does not check that it verifies; use
    /// [`verify_signature`](Self::verify_signature) or
    /// [`super::verify_transaction`] for that.
    pub fn new(raw: RawTransaction, signature: Signature) -> Self {
        let hash = raw.signed_hash(&signature);
        Self {
            raw,
            signature,
            hash,
        }
    }

    pub fn raw(&self) -> &RawTransaction {
        &self.raw
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn hash(&self) -> &TxHash {
        &self.hash
    }

    pub fn nonce(&self) -> u64 {
        self.raw.nonce()
    }

    /// `true` if the signature verifies against the declared sender.
    pub fn verify_signature(&self) -> bool {
        match self.raw.sender().to_verifying_key() {
            Some(key) => verify_hash(&key, self.raw.hash().as_bytes(), &self.signature),
            None => false,
        }
    }
}

/// Sign `raw` with `keypair`.
///
/// The caller is responsible for making sure `keypair` owns `raw.sender()`;
/// signers enforce that before they get here.
///
/// # Example
///
/// ```rust,no_run
/// use nova_client::crypto::KeyPair;
/// use nova_client::transaction::{sign_transaction, ChainIdHash, RawTransaction};
///
/// let keypair = KeyPair::generate();
/// let raw = RawTransaction::builder()
///     .chain_id(ChainIdHash::of(b"nova-testnet"))
///     .sender(keypair.address())
///     .recipient(KeyPair::generate().address())
///     .amount(1_000)
///     .nonce(1)
///     .build()
///     .unwrap();
///
/// let signed = sign_transaction(&keypair, raw).unwrap();
/// assert!(signed.verify_signature());
/// ```
pub fn sign_transaction(
    keypair: &KeyPair,
    raw: RawTransaction,
) -> Result<SignedTransaction, KeyError> {
    let signature = keypair.sign_hash(raw.hash().as_bytes())?;
    Ok(SignedTransaction::new(raw, signature))
}
