//! Raw transaction construction via the builder pattern.
//!
//! [`RawTransactionBuilder`] collects the fields, `.build()` validates that
//! the ones without sensible defaults are present, and out comes an
//! immutable [`RawTransaction`]. Signing happens in [`super::signing`], so
//! construction stays testable without key material.

use serde::{Deserialize, Serialize};

use super::types::{minimal_be_bytes, ChainIdHash, Fee, TxHash, TxType};
use super::verification::TransactionError;
use crate::crypto::address::AccountAddress;
use crate::crypto::hash::sha256_concat;
use crate::crypto::signatures::Signature;

// ---------------------------------------------------------------------------
// RawTransaction
// ---------------------------------------------------------------------------

/// An unsigned ledger transaction.
///
/// Immutable once built. Changing the nonce produces a new value via
/// [`with_nonce`](Self::with_nonce); nothing edits a transaction in place.
///
/// # Hash layout
///
/// [`RawTransaction::hash`] is SHA-256 over, in order:
///
/// ```text
/// nonce          u64 little-endian
/// sender         33 bytes
/// recipient      33 bytes, or nothing for contract deployment
/// amount         minimal big-endian (zero = empty)
/// payload        raw bytes
/// fee limit      u64 little-endian
/// fee price      minimal big-endian
/// tx type        i32 little-endian
/// chain id hash  32 bytes
/// ```
///
/// The signed hash appends the DER signature to that same input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    chain_id: ChainIdHash,
    sender: AccountAddress,
    recipient: Option<AccountAddress>,
    amount: u128,
    nonce: u64,
    fee: Fee,
    payload: Vec<u8>,
    tx_type: TxType,
}

impl RawTransaction {
    pub fn builder() -> RawTransactionBuilder {
        RawTransactionBuilder::default()
    }

    pub fn chain_id(&self) -> &ChainIdHash {
        &self.chain_id
    }

    pub fn sender(&self) -> &AccountAddress {
        &self.sender
    }

    pub fn recipient(&self) -> Option<&AccountAddress> {
        self.recipient.as_ref()
    }

    pub fn amount(&self) -> u128 {
        self.amount
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn fee(&self) -> Fee {
        self.fee
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn tx_type(&self) -> TxType {
        self.tx_type
    }

    /// A copy of this transaction carrying `nonce`.
    pub fn with_nonce(&self, nonce: u64) -> Self {
        Self {
            nonce,
            ..self.clone()
        }
    }

    /// Hash of the unsigned content. This is the digest that gets signed.
    pub fn hash(&self) -> TxHash {
        self.hash_with(None)
    }

    /// Hash of the content plus its signature. This is the transaction's
    /// identity on the ledger.
    pub fn signed_hash(&self, signature: &Signature) -> TxHash {
        self.hash_with(Some(signature))
    }

    fn hash_with(&self, signature: Option<&Signature>) -> TxHash {
        let nonce = self.nonce.to_le_bytes();
        let recipient: &[u8] = match &self.recipient {
            Some(address) => address.as_bytes(),
            None => &[],
        };
        let amount = minimal_be_bytes(self.amount);
        let fee_limit = self.fee.limit.to_le_bytes();
        let fee_price = minimal_be_bytes(self.fee.price);
        let tx_type = self.tx_type.as_i32().to_le_bytes();
        let signature: &[u8] = signature.map(Signature::as_bytes).unwrap_or(&[]);

        TxHash::from_bytes(sha256_concat(&[
            &nonce,
            self.sender.as_bytes(),
            recipient,
            &amount,
            &self.payload,
            &fee_limit,
            &fee_price,
            &tx_type,
            self.chain_id.as_bytes(),
            signature,
        ]))
    }
}

// ---------------------------------------------------------------------------
// RawTransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`RawTransaction`].
///
/// # Usage
///
/// ```rust,no_run
/// use nova_client::crypto::KeyPair;
/// use nova_client::transaction::{ChainIdHash, Fee, RawTransaction};
///
/// let alice = KeyPair::generate().address();
/// let bob = KeyPair::generate().address();
///
/// let tx = RawTransaction::builder()
///     .chain_id(ChainIdHash::of(b"nova-testnet"))
///     .sender(alice)
///     .recipient(bob)
///     .amount(50_000)
///     .fee(Fee::new(100, 1))
///     .nonce(7)
///     .build()
///     .unwrap();
/// ```
///
/// `chain_id` and `sender` are required. Everything else defaults to zero,
/// empty, or [`TxType::Normal`]. Leaving out the recipient is how you
/// deploy a contract.
#[derive(Debug, Clone, Default)]
pub struct RawTransactionBuilder {
    chain_id: Option<ChainIdHash>,
    sender: Option<AccountAddress>,
    recipient: Option<AccountAddress>,
    amount: u128,
    nonce: u64,
    fee: Fee,
    payload: Vec<u8>,
    tx_type: TxType,
}

impl RawTransactionBuilder {
    pub fn chain_id(mut self, chain_id: ChainIdHash) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn sender(mut self, sender: AccountAddress) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn recipient(mut self, recipient: AccountAddress) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn amount(mut self, amount: u128) -> Self {
        self.amount = amount;
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn fee(mut self, fee: Fee) -> Self {
        self.fee = fee;
        self
    }

    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn tx_type(mut self, tx_type: TxType) -> Self {
        self.tx_type = tx_type;
        self
    }

    /// Consumes the builder and produces an unsigned [`RawTransaction`].
    pub fn build(self) -> Result<RawTransaction, TransactionError> {
        Ok(RawTransaction {
            chain_id: self
                .chain_id
                .ok_or(TransactionError::MissingField("chain_id"))?,
            sender: self.sender.ok_or(TransactionError::MissingField("sender"))?,
            recipient: self.recipient,
            amount: self.amount,
            nonce: self.nonce,
            fee: self.fee,
            payload: self.payload,
            tx_type: self.tx_type,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
