//! Signer that delegates to an external key custody service.
//!
//! The service holds keys by address and signs on request once an address
//! has been unlocked there. This side only remembers which address is
//! unlocked and the credential that unlocked it (so it can lock it again).
//!
//! Every signature that comes back is verified locally against the
//! address before it is used. An address is a public key, so a custody
//! service that signs with the wrong key is caught here and not by the
//! node.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crypto::address::AccountAddress;
use crate::crypto::signatures::{self, verify_hash, Signature};
use crate::transaction::builder::RawTransaction;
use crate::transaction::signing::SignedTransaction;

use super::{ensure_sender, Credential, LockOutcome, Signer, SignerError, SignerLifecycle};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
    #[error("custody rejected the credential")]
    Authentication,

    #[error("address is locked in custody")]
    Locked,

    #[error("custody unreachable: {0}")]
    Connection(String),

    #[error("custody refused: {0}")]
    Rejected(String),
}

/// The custody service's interface.
#[async_trait]
pub trait KeyCustody: Send + Sync {
    async fn unlock(
        &self,
        address: &AccountAddress,
        credential: &Credential,
    ) -> Result<(), CustodyError>;

    async fn lock(
        &self,
        address: &AccountAddress,
        credential: &Credential,
    ) -> Result<(), CustodyError>;

    /// Sign `raw.hash()` with the key for `address`.
    async fn sign(
        &self,
        address: &AccountAddress,
        raw: &RawTransaction,
    ) -> Result<Signature, CustodyError>;

    /// Sign `sha256(message)` with the key for `address`.
    async fn sign_message(
        &self,
        address: &AccountAddress,
        message: &[u8],
    ) -> Result<Signature, CustodyError>;

    /// Addresses the service holds keys for.
    async fn list(&self) -> Result<Vec<AccountAddress>, CustodyError>;
}

#[derive(Clone)]
struct Session {
    address: AccountAddress,
    credential: Credential,
}

fn custody_error(address: &AccountAddress, err: CustodyError) -> SignerError {
    match err {
        CustodyError::Authentication => SignerError::Authentication { address: *address },
        CustodyError::Locked => SignerError::Locked,
        CustodyError::Connection(msg) => SignerError::Connection(msg),
        CustodyError::Rejected(msg) => SignerError::Custody(msg),
    }
}

pub struct RemoteSigner {
    custody: Arc<dyn KeyCustody>,
    session: RwLock<Option<Session>>,
}

impl RemoteSigner {
    pub fn new(custody: Arc<dyn KeyCustody>) -> Self {
        Self {
            custody,
            session: RwLock::new(None),
        }
    }

    /// Addresses the custody service can sign for.
    pub async fn identities(&self) -> Result<Vec<AccountAddress>, SignerError> {
        self.custody.list().await.map_err(|e| match e {
            CustodyError::Connection(msg) => SignerError::Connection(msg),
            other => SignerError::Custody(other.to_string()),
        })
    }

    fn current(&self) -> Result<AccountAddress, SignerError> {
        self.session
            .read()
            .as_ref()
            .map(|s| s.address)
            .ok_or(SignerError::Locked)
    }
}

#[async_trait]
impl Signer for RemoteSigner {
    fn principal(&self) -> Result<AccountAddress, SignerError> {
        self.current()
    }

    async fn sign(&self, raw: &RawTransaction) -> Result<SignedTransaction, SignerError> {
        let address = self.current()?;
        ensure_sender(&address, raw)?;

        let signature = self
            .custody
            .sign(&address, raw)
            .await
            .map_err(|e| custody_error(&address, e))?;

        let verifies = address
            .to_verifying_key()
            .is_some_and(|key| verify_hash(&key, raw.hash().as_bytes(), &signature));
        if !verifies {
            warn!(%address, nonce = raw.nonce(), "custody returned a signature that does not verify");
            return Err(SignerError::Custody(format!(
                "signature from custody does not verify for {address}"
            )));
        }

        let signed = SignedTransaction::new(raw.clone(), signature);
        debug!(sender = %address, nonce = raw.nonce(), hash = %signed.hash(), "remote signed transaction");
        Ok(signed)
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        let address = self.current()?;
        let signature = self
            .custody
            .sign_message(&address, message)
            .await
            .map_err(|e| custody_error(&address, e))?;

        if !signatures::verify(&address, message, &signature) {
            return Err(SignerError::Custody(format!(
                "message signature from custody does not verify for {address}"
            )));
        }
        Ok(signature)
    }
}

#[async_trait]
impl SignerLifecycle for RemoteSigner {
    async fn unlock(
        &self,
        address: &AccountAddress,
        credential: &Credential,
    ) -> Result<AccountAddress, SignerError> {
        self.custody
            .unlock(address, credential)
            .await
            .map_err(|e| custody_error(address, e))?;

        let previous = self.session.write().replace(Session {
            address: *address,
            credential: credential.clone(),
        });

        if let Some(previous) = previous.filter(|p| p.address != *address) {
            // Best effort. The new session is already in place.
            if let Err(e) = self.custody.lock(&previous.address, &previous.credential).await {
                warn!(previous = %previous.address, error = %e, "failed to lock replaced session");
            }
        }
        info!(%address, "remote signer unlocked");
        Ok(*address)
    }

    async fn lock(&self) -> Result<LockOutcome, SignerError> {
        let current = self.session.write().take();
        let Some(session) = current else {
            return Ok(LockOutcome::NothingToLock);
        };

        match self.custody.lock(&session.address, &session.credential).await {
            Ok(()) | Err(CustodyError::Locked) => {
                info!(address = %session.address, "remote signer locked");
                Ok(LockOutcome::Locked)
            }
            Err(e) => {
                let address = session.address;
                // Still unlocked remotely, so stay unlocked here too unless
                // someone unlocked something else meanwhile.
                let mut slot = self.session.write();
                if slot.is_none() {
                    *slot = Some(session);
                }
                Err(custody_error(&address, e))
            }
        }
    }
}

impl fmt::Debug for RemoteSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSigner")
            .field("principal", &self.current().ok())
            .finish()
    }
}
