//! Local verification of signed transactions.
//!
//! The node is the final judge, but a client that ships a transaction it
//! could have rejected itself wastes a round trip and a nonce. The checks
//! here run before submission: cheap comparisons first, curve math last.

use thiserror::Error;

use super::signing::SignedTransaction;
use super::types::{ChainIdHash, TxHash};
use crate::crypto::address::AccountAddress;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from building or checking a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// A required builder field was never set.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The transaction targets a different ledger than the one configured.
    #[error("chain id mismatch: expected {expected}, got {actual}")]
    ChainIdMismatch {
        expected: ChainIdHash,
        actual: ChainIdHash,
    },

    /// The signature does not verify against the declared sender.
    #[error("invalid signature: does not verify against sender {sender}")]
    InvalidSignature { sender: AccountAddress },

    /// The recorded hash does not match the signed content.
    #[error("transaction hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: TxHash, actual: TxHash },
}

/// Check that `tx` belongs to `chain_id` and carries a valid signature by
/// its sender.
pub fn verify_transaction(
    tx: &SignedTransaction,
    chain_id: &ChainIdHash,
) -> Result<(), TransactionError> {
    let raw = tx.raw();

    if raw.chain_id() != chain_id {
        return Err(TransactionError::ChainIdMismatch {
            expected: *chain_id,
            actual: *raw.chain_id(),
        });
    }

    let expected = raw.signed_hash(tx.signature());
    if expected != *tx.hash() {
        return Err(TransactionError::HashMismatch {
            expected,
            actual: *tx.hash(),
        });
    }

    if !tx.verify_signature() {
        return Err(TransactionError::InvalidSignature {
            sender: *raw.sender(),
        });
    }

    Ok(())
}
