//! # Key Stores
//!
//! Where a [`LocalSigner`](super::LocalSigner) gets its keys from. A key
//! store only ever holds sealed keys ([`EncryptedPrivateKey`]); plaintext
//! exists briefly in [`KeyStore::load`]'s return value and nowhere else.
//!
//! The AES-GCM tag does the credential check. A wrong password fails
//! authentication on open, so the store never keeps a password digest of
//! its own.

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::crypto::address::AccountAddress;
use crate::crypto::encryption::EncryptedPrivateKey;
use crate::crypto::keys::{KeyError, KeyPair};

use super::{Credential, SignerError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyStoreError {
    #[error("no key stored for {0}")]
    NotFound(AccountAddress),

    #[error("wrong credential for {0}")]
    Authentication(AccountAddress),

    /// The backing storage itself failed.
    #[error("key store backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Key(#[from] KeyError),
}

impl From<KeyStoreError> for SignerError {
    fn from(err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::Authentication(address) => SignerError::Authentication { address },
            KeyStoreError::Key(key) => SignerError::Key(key),
            other => SignerError::KeyStore(other.to_string()),
        }
    }
}

/// Storage for sealed private keys, indexed by address.
pub trait KeyStore: Send + Sync {
    /// Seal `key` under `credential` and store it. Replaces any previous
    /// entry for the same address.
    fn save(&self, key: &KeyPair, credential: &Credential)
        -> Result<AccountAddress, KeyStoreError>;

    /// Open the key for `address`.
    fn load(
        &self,
        address: &AccountAddress,
        credential: &Credential,
    ) -> Result<KeyPair, KeyStoreError>;

    /// Hand out the sealed key for `address`, after checking `credential`
    /// opens it.
    fn export(
        &self,
        address: &AccountAddress,
        credential: &Credential,
    ) -> Result<EncryptedPrivateKey, KeyStoreError>;

    /// Delete the key for `address`, after checking `credential` opens it.
    fn remove(&self, address: &AccountAddress, credential: &Credential)
        -> Result<(), KeyStoreError>;

    /// Every stored address.
    fn identities(&self) -> Vec<AccountAddress>;
}

/// A process-lifetime key store. Nothing touches disk.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: DashMap<AccountAddress, EncryptedPrivateKey>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an already sealed key as-is.
    pub fn insert_sealed(&self, address: AccountAddress, sealed: EncryptedPrivateKey) {
        self.keys.insert(address, sealed);
    }

    fn sealed(&self, address: &AccountAddress) -> Result<EncryptedPrivateKey, KeyStoreError> {
        self.keys
            .get(address)
            .map(|entry| entry.value().clone())
            .ok_or(KeyStoreError::NotFound(*address))
    }
}

fn open(
    sealed: &EncryptedPrivateKey,
    address: &AccountAddress,
    credential: &Credential,
) -> Result<KeyPair, KeyStoreError> {
    let key = KeyPair::import(sealed, credential.as_bytes()).map_err(|e| match e {
        KeyError::Authentication => KeyStoreError::Authentication(*address),
        other => KeyStoreError::Key(other),
    })?;

    // A sealed entry under the wrong address is corruption, not a password
    // problem.
    if key.address() != *address {
        return Err(KeyStoreError::Backend(format!(
            "stored key for {address} opens to {}",
            key.address()
        )));
    }
    Ok(key)
}

impl KeyStore for InMemoryKeyStore {
    fn save(
        &self,
        key: &KeyPair,
        credential: &Credential,
    ) -> Result<AccountAddress, KeyStoreError> {
        let address = key.address();
        let sealed = key.export(credential.as_bytes())?;
        self.keys.insert(address, sealed);
        debug!(%address, "saved key");
        Ok(address)
    }

    fn load(
        &self,
        address: &AccountAddress,
        credential: &Credential,
    ) -> Result<KeyPair, KeyStoreError> {
        open(&self.sealed(address)?, address, credential)
    }

    fn export(
        &self,
        address: &AccountAddress,
        credential: &Credential,
    ) -> Result<EncryptedPrivateKey, KeyStoreError> {
        let sealed = self.sealed(address)?;
        open(&sealed, address, credential)?;
        Ok(sealed)
    }

    fn remove(
        &self,
        address: &AccountAddress,
        credential: &Credential,
    ) -> Result<(), KeyStoreError> {
        open(&self.sealed(address)?, address, credential)?;
        self.keys.remove(address);
        debug!(%address, "removed key");
        Ok(())
    }

    fn identities(&self) -> Vec<AccountAddress> {
        let mut out: Vec<_> = self.keys.iter().map(|entry| *entry.key()).collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let store = InMemoryKeyStore::new();
        let kp = KeyPair::generate();
        let address = store.save(&kp, &"pw".into()).unwrap();
        assert_eq!(address, kp.address());
        assert_eq!(store.load(&address, &"pw".into()).unwrap(), kp);
    }

    #[test]
    fn test_wrong_credential_is_authentication() {
        let store = InMemoryKeyStore::new();
        let address = store.save(&KeyPair::generate(), &"pw".into()).unwrap();
        assert_eq!(
            store.load(&address, &"nope".into()).unwrap_err(),
            KeyStoreError::Authentication(address)
        );
    }

    #[test]
    fn test_unknown_address_is_not_found() {
        let store = InMemoryKeyStore::new();
        let address = KeyPair::generate().address();
        assert_eq!(
            store.load(&address, &"pw".into()).unwrap_err(),
            KeyStoreError::NotFound(address)
        );
    }

    #[test]
    fn test_export_requires_credential_and_imports_back() {
        let store = InMemoryKeyStore::new();
        let kp = KeyPair::generate();
        let address = store.save(&kp, &"pw".into()).unwrap();

        assert!(matches!(
            store.export(&address, &"bad".into()),
            Err(KeyStoreError::Authentication(_))
        ));
        let sealed = store.export(&address, &"pw".into()).unwrap();
        assert_eq!(KeyPair::import(&sealed, b"pw").unwrap(), kp);
    }

    #[test]
    fn test_identities_and_remove() {
        let store = InMemoryKeyStore::new();
        let a = store.save(&KeyPair::generate(), &"a".into()).unwrap();
        let b = store.save(&KeyPair::generate(), &"b".into()).unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(store.identities(), expected);

        assert!(store.remove(&a, &"b".into()).is_err());
        store.remove(&a, &"a".into()).unwrap();
        assert_eq!(store.identities(), vec![b]);
    }

    #[test]
    fn test_misfiled_key_is_backend_error() {
        let store = InMemoryKeyStore::new();
        let kp = KeyPair::generate();
        let elsewhere = KeyPair::generate().address();
        store.insert_sealed(elsewhere, kp.export(b"pw").unwrap());
        assert!(matches!(
            store.load(&elsewhere, &"pw".into()),
            Err(KeyStoreError::Backend(_))
        ));
    }

    #[test]
    fn test_signer_error_mapping_keeps_auth_distinct() {
        let address = KeyPair::generate().address();
        assert_eq!(
            SignerError::from(KeyStoreError::Authentication(address)),
            SignerError::Authentication { address }
        );
        assert!(matches!(
            SignerError::from(KeyStoreError::NotFound(address)),
            SignerError::KeyStore(_)
        ));
        assert!(matches!(
            SignerError::from(KeyStoreError::Backend("disk".into())),
            SignerError::KeyStore(_)
        ));
    }
}
