//! In-process signer backed by a [`KeyStore`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::crypto::address::AccountAddress;
use crate::crypto::keys::KeyPair;
use crate::crypto::signatures::Signature;
use crate::transaction::builder::RawTransaction;
use crate::transaction::signing::{sign_transaction, SignedTransaction};

use super::keystore::{InMemoryKeyStore, KeyStore};
use super::{ensure_sender, Credential, LockOutcome, Signer, SignerError, SignerLifecycle};

/// Holds at most one decrypted [`KeyPair`] at a time.
///
/// The key is dropped (and k256 zeroizes it) on `lock()` and whenever a
/// different account is unlocked in its place.
pub struct LocalSigner {
    store: Arc<dyn KeyStore>,
    unlocked: RwLock<Option<KeyPair>>,
}

impl LocalSigner {
    /// A locked signer over `store`.
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            unlocked: RwLock::new(None),
        }
    }

    /// An already unlocked signer for `key`, with an empty in-memory store.
    /// Once locked it stays locked unless the key is saved somewhere.
    pub fn from_key_pair(key: KeyPair) -> Self {
        Self {
            store: Arc::new(InMemoryKeyStore::new()),
            unlocked: RwLock::new(Some(key)),
        }
    }

    pub fn key_store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn principal(&self) -> Result<AccountAddress, SignerError> {
        self.unlocked
            .read()
            .as_ref()
            .map(KeyPair::address)
            .ok_or(SignerError::Locked)
    }

    async fn sign(&self, raw: &RawTransaction) -> Result<SignedTransaction, SignerError> {
        let guard = self.unlocked.read();
        let key = guard.as_ref().ok_or(SignerError::Locked)?;
        ensure_sender(&key.address(), raw)?;

        let signed = sign_transaction(key, raw.clone())?;
        debug!(
            sender = %key.address(),
            nonce = raw.nonce(),
            hash = %signed.hash(),
            "signed transaction"
        );
        Ok(signed)
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SignerError> {
        let guard = self.unlocked.read();
        let key = guard.as_ref().ok_or(SignerError::Locked)?;
        Ok(key.sign(message)?)
    }
}

#[async_trait]
impl SignerLifecycle for LocalSigner {
    async fn unlock(
        &self,
        address: &AccountAddress,
        credential: &Credential,
    ) -> Result<AccountAddress, SignerError> {
        let key = self.store.load(address, credential)?;
        let unlocked = key.address();

        let previous = self.unlocked.write().replace(key);
        if let Some(previous) = previous {
            debug!(previous = %previous.address(), "replaced unlocked key");
        }
        info!(address = %unlocked, "signer unlocked");
        Ok(unlocked)
    }

    async fn lock(&self) -> Result<LockOutcome, SignerError> {
        match self.unlocked.write().take() {
            Some(key) => {
                info!(address = %key.address(), "signer locked");
                Ok(LockOutcome::Locked)
            }
            None => Ok(LockOutcome::NothingToLock),
        }
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("principal", &self.principal().ok())
            .finish()
    }
}
