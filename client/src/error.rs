//! Crate-level error type.
//!
//! Each module owns its error enum; [`ClientError`] is what the
//! transaction pipeline and the wallet hand back to callers. Node
//! rejections are split on the way in: a nonce conflict is
//! [`ClientError::RetryableConflict`], anything else the node refuses is
//! [`ClientError::FatalCommit`].

use thiserror::Error;

use crate::config::ConfigError;
use crate::crypto::encoding::EncodingError;
use crate::crypto::keys::KeyError;
use crate::nonce::NonceError;
use crate::rpc::{CommitError, RpcError};
use crate::signer::SignerError;
use crate::transaction::types::ChainIdHash;
use crate::transaction::verification::TransactionError;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Nonce(#[from] NonceError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The node rejected the nonce. Retried by the requester while budget
    /// remains.
    #[error("retryable conflict: {0}")]
    RetryableConflict(CommitError),

    /// The node rejected the transaction for a reason a new nonce won't fix.
    #[error("commit failed: {0}")]
    FatalCommit(CommitError),

    #[error("connection error: {0}")]
    Connection(String),

    /// The transaction targets a different chain than this client.
    #[error("chain id mismatch: client is on {expected}, transaction is for {actual}")]
    ChainIdMismatch {
        expected: ChainIdHash,
        actual: ChainIdHash,
    },
}

impl ClientError {
    /// `true` for [`ClientError::RetryableConflict`].
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, ClientError::RetryableConflict(_))
    }

    /// The node's rejection, if this error carries one.
    pub fn commit_error(&self) -> Option<&CommitError> {
        match self {
            ClientError::RetryableConflict(e) | ClientError::FatalCommit(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RpcError> for ClientError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Commit(e) if e.is_retryable() => ClientError::RetryableConflict(e),
            RpcError::Commit(e) => ClientError::FatalCommit(e),
            RpcError::Connection(msg) => ClientError::Connection(msg),
        }
    }
}
