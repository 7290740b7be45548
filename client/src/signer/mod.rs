//! # Signers
//!
//! A signer is something that can produce valid signatures for one
//! account without necessarily handing its private key to anyone.
//!
//! Two flavors:
//!
//! - [`LocalSigner`] decrypts a key from a [`KeyStore`] into process memory
//!   on unlock and zeroizes it on lock.
//! - [`RemoteSigner`] asks a [`KeyCustody`] service to sign by address. The
//!   scalar never enters this process.
//!
//! Both share one lifecycle:
//!
//! ```text
//!            unlock(address, credential)
//!   Locked ──────────────────────────────▶ Unlocked
//!     ▲                                       │
//!     └──────────────── lock() ───────────────┘
//! ```
//!
//! - A wrong credential is [`SignerError::Authentication`]. Storage and
//!   transport failures have their own variants; callers can tell "you
//!   typed it wrong" from "the disk is on fire".
//! - `lock()` on a locked signer returns [`LockOutcome::NothingToLock`],
//!   not an error.
//! - Signing while locked is [`SignerError::Locked`].
//! - Signing a transaction whose sender isn't the unlocked account is
//!   [`SignerError::SenderMismatch`].
//! - Unlocking a second account replaces the first. No explicit lock
//!   needed in between.

pub mod keystore;
pub mod local;
pub mod remote;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::address::AccountAddress;
use crate::crypto::keys::KeyError;
use crate::crypto::signatures::{self, Signature};
use crate::transaction::builder::RawTransaction;
use crate::transaction::signing::SignedTransaction;

pub use keystore::{InMemoryKeyStore, KeyStore, KeyStoreError};
pub use local::LocalSigner;
pub use remote::{CustodyError, KeyCustody, RemoteSigner};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The credential does not open the key for this address.
    #[error("authentication failed for {address}")]
    Authentication { address: AccountAddress },

    /// No account is unlocked.
    #[error("signer is locked")]
    Locked,

    /// The transaction names a different sender than the unlocked account.
    #[error("sender mismatch: signer is {expected}, transaction sender is {actual}")]
    SenderMismatch {
        expected: AccountAddress,
        actual: AccountAddress,
    },

    /// The key store failed for reasons unrelated to the credential.
    #[error("key store error: {0}")]
    KeyStore(String),

    /// The remote key custody service could not be reached.
    #[error("key custody connection error: {0}")]
    Connection(String),

    /// The custody service answered, but with a refusal or a signature
    /// that does not verify.
    #[error("key custody error: {0}")]
    Custody(String),

    #[error(transparent)]
    Key(#[from] KeyError),
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// A password that unlocks a stored key. Zeroized on drop and never
/// printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Credential {
    fn from(password: &str) -> Self {
        Self::new(password)
    }
}

impl From<String> for Credential {
    fn from(password: String) -> Self {
        Self::new(password)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Result of a `lock()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// An account was unlocked and is now locked.
    Locked,
    /// Nothing was unlocked. Not an error.
    NothingToLock,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// The signing capability itself.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The unlocked account, or [`SignerError::Locked`].
    fn principal(&self) -> Result<AccountAddress, SignerError>;

    /// Sign a raw transaction whose sender is [`principal`](Self::principal).
    async fn sign(&self, raw: &RawTransaction) -> Result<SignedTransaction, SignerError>;

    /// Sign `sha256(message)`.
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SignerError>;

    /// Sign a text message and return the signature as base64.
    async fn sign_message_text(&self, message: &str) -> Result<String, SignerError> {
        Ok(self.sign_message(message.as_bytes()).await?.to_base64())
    }

    /// Check a signature over `message` against the unlocked account.
    async fn verify_message(
        &self,
        message: &[u8],
        signature: &Signature,
    ) -> Result<bool, SignerError> {
        let principal = self.principal()?;
        Ok(signatures::verify(&principal, message, signature))
    }
}

/// Locking and unlocking.
#[async_trait]
pub trait SignerLifecycle: Signer {
    /// Unlock `address` with `credential`. Returns the unlocked address.
    async fn unlock(
        &self,
        address: &AccountAddress,
        credential: &Credential,
    ) -> Result<AccountAddress, SignerError>;

    /// Lock whatever is unlocked. Idempotent.
    async fn lock(&self) -> Result<LockOutcome, SignerError>;

    fn is_unlocked(&self) -> bool {
        self.principal().is_ok()
    }
}

/// Refuse to sign for someone else.
pub(crate) fn ensure_sender(
    principal: &AccountAddress,
    raw: &RawTransaction,
) -> Result<(), SignerError> {
    if raw.sender() != principal {
        return Err(SignerError::SenderMismatch {
            expected: *principal,
            actual: *raw.sender(),
        });
    }
    Ok(())
}
