//! # Node Collaborators
//!
//! The two things the client needs from a ledger node, expressed as
//! traits so the transport (gRPC, JSON-RPC, an in-memory fake in tests)
//! stays someone else's problem:
//!
//! | Trait                    | Call                     | Used by                       |
//! |--------------------------|--------------------------|-------------------------------|
//! | [`AccountStateReader`]   | `fetch_account_state`    | nonce seeding and rebind      |
//! | [`TransactionCommitter`] | `submit_transaction`     | the requester, once per try   |
//!
//! Failures come back as [`RpcError`]: either the node answered and said
//! no ([`RpcError::Commit`] with a [`CommitStatus`]), or we never got a
//! straight answer ([`RpcError::Connection`]). The two are never mixed up.
//! A dropped connection says nothing about the nonce.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::address::AccountAddress;
use crate::transaction::signing::SignedTransaction;
use crate::transaction::types::TxHash;

// ---------------------------------------------------------------------------
// Account state
// ---------------------------------------------------------------------------

/// Authoritative account snapshot from the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub address: AccountAddress,
    /// Nonce of the last transaction the ledger accepted from this account.
    pub nonce: u64,
    pub balance: u128,
}

impl AccountState {
    pub fn new(address: AccountAddress, nonce: u64, balance: u128) -> Self {
        Self {
            address,
            nonce,
            balance,
        }
    }
}

// ---------------------------------------------------------------------------
// Commit status
// ---------------------------------------------------------------------------

/// The node's verdict on a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitStatus {
    Ok,
    /// The nonce is at or below the account's confirmed nonce.
    NonceTooLow,
    /// Another pending transaction already holds this nonce.
    DuplicateNonce,
    TxAlreadyExists,
    InvalidHash,
    InvalidSignature,
    InvalidFormat,
    InsufficientBalance,
    InvalidChainId,
    InternalError,
    Unrecognized,
}

impl CommitStatus {
    /// Only nonce conflicts are worth a resync and another try. Everything
    /// else will fail the same way next time.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::NonceTooLow | Self::DuplicateNonce)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NonceTooLow => "NONCE_TOO_LOW",
            Self::DuplicateNonce => "DUPLICATE_NONCE",
            Self::TxAlreadyExists => "TX_ALREADY_EXISTS",
            Self::InvalidHash => "INVALID_HASH",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::InsufficientBalance => "INSUFFICIENT_BALANCE",
            Self::InvalidChainId => "INVALID_CHAIN_ID",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Unrecognized => "UNRECOGNIZED",
        }
    }
}

impl fmt::Display for CommitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejection from the node, kept exactly as it was reported.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("commit rejected with {status}: {detail}")]
pub struct CommitError {
    pub status: CommitStatus,
    pub detail: String,
}

impl CommitError {
    pub fn new(status: CommitStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }
}

/// Errors from talking to the node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The node processed the request and rejected it.
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// Transport failure: refused, reset, timed out, unparseable response.
    #[error("connection error: {0}")]
    Connection(String),
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Read-only access to confirmed account state.
#[async_trait]
pub trait AccountStateReader: Send + Sync {
    async fn fetch_account_state(&self, address: &AccountAddress)
        -> Result<AccountState, RpcError>;
}

/// Submission of signed transactions.
#[async_trait]
pub trait TransactionCommitter: Send + Sync {
    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<TxHash, RpcError>;
}

#[async_trait]
impl<T: AccountStateReader + ?Sized> AccountStateReader for Arc<T> {
    async fn fetch_account_state(
        &self,
        address: &AccountAddress,
    ) -> Result<AccountState, RpcError> {
        (**self).fetch_account_state(address).await
    }
}

#[async_trait]
impl<T: TransactionCommitter + ?Sized> TransactionCommitter for Arc<T> {
    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<TxHash, RpcError> {
        (**self).submit_transaction(tx).await
    }
}
