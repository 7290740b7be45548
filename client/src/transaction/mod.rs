//! # Transaction Module
//!
//! Construction, signing and local verification of ledger transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        Value types (ChainIdHash, TxHash, Fee, TxType)
//! builder.rs      RawTransaction and its fluent builder, hash layout
//! signing.rs      SignedTransaction and sign_transaction
//! verification.rs Pre-submission checks (chain id, hash, signature)
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: [`RawTransaction::builder`] assembles the fields.
//! 2. **Sign**: a [`crate::signer::Signer`] (or [`sign_transaction`] with a
//!    bare keypair) produces a [`SignedTransaction`].
//! 3. **Verify**: [`verify_transaction`] catches a wrong chain or a bad
//!    signature before the node does.
//! 4. **Submit**: hand it to a [`crate::rpc::TransactionCommitter`],
//!    normally through [`crate::requester::TxRequester`].
//!
//! All amounts are integers in the smallest denomination. No floating
//! point anywhere near monetary values.

pub mod builder;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{RawTransaction, RawTransactionBuilder};
pub use signing::{sign_transaction, SignedTransaction};
pub use types::{ChainIdHash, Fee, TxHash, TxType};
pub use verification::{verify_transaction, TransactionError};
