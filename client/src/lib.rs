// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # NOVA Client
//!
//! Client-side plumbing for submitting transactions to a NOVA ledger node:
//! keys, signatures, signers, nonce bookkeeping, and a submission loop that
//! recovers from nonce conflicts on its own.
//!
//! Accounts are secp256k1 keys. An account's address *is* its compressed
//! public key (33 bytes), so anyone holding an address can verify that
//! account's signatures without asking the node.
//!
//! ## Architecture
//!
//! - **crypto**: keys, addresses, low-S DER signatures, versioned base58
//!   text forms, password-sealed private keys.
//! - **transaction**: raw transaction layout, hashing, signing, checks.
//! - **signer**: the signing capability with a lock/unlock lifecycle, backed
//!   by a local key store or a remote custody service.
//! - **nonce**: per-address nonce cache seeded from the node.
//! - **requester**: the submit-and-retry loop.
//! - **wallet**: all of the above behind one handle.
//! - **rpc**: what this crate needs from a node, as traits.
//! - **config**, **logging**, **metrics**, **error**: the usual.
//!
//! ## Ground Rules
//!
//! 1. No global state. Every component gets its collaborators passed in.
//! 2. Secret material is zeroized on drop and never shows up in `Debug`.
//! 3. The node's verdict is final. A nonce conflict is retried; anything
//!    else goes straight back to the caller, unchanged.

pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod nonce;
pub mod requester;
pub mod rpc;
pub mod signer;
pub mod transaction;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use config::{ClientConfig, RetryPolicy};
pub use crypto::{AccountAddress, KeyPair, Signature};
pub use error::{ClientError, Result};
pub use nonce::NonceProvider;
pub use requester::{TxRequester, TxTemplate};
pub use rpc::{AccountState, AccountStateReader, CommitError, CommitStatus, RpcError, TransactionCommitter};
pub use signer::{Credential, LocalSigner, RemoteSigner, Signer, SignerError, SignerLifecycle};
pub use wallet::Wallet;
