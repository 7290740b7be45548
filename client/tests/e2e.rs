//! End-to-end integration tests for the NOVA client.
//!
//! These tests drive the public API against an in-memory ledger that
//! behaves like a node: it checks chain id, hash and signature, enforces
//! nonce order and balances, and answers with the same rejection codes.
//! Key stores, signers, the nonce cache and the retry loop are all the
//! real thing.
//!
//! Each test builds its own ledger and wallet. Nothing is shared.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use proptest::prelude::*;

use nova_client::config::RetryConfig;
use nova_client::crypto::{AccountAddress, EncodingError, KeyError, KeyPair};
use nova_client::rpc::{
    AccountState, AccountStateReader, CommitError, CommitStatus, RpcError, TransactionCommitter,
};
use nova_client::signer::{
    CustodyError, InMemoryKeyStore, KeyCustody, KeyStore, LockOutcome, SignerError,
};
use nova_client::transaction::{
    verify_transaction, ChainIdHash, Fee, RawTransaction, SignedTransaction, TxHash,
    TransactionError,
};
use nova_client::{
    ClientConfig, ClientError, Credential, LocalSigner, RemoteSigner, Signature, Signer,
    SignerLifecycle, TxTemplate, Wallet,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn chain() -> ChainIdHash {
    ChainIdHash::of(b"nova-e2e")
}

#[derive(Default)]
struct Account {
    /// Highest nonce below which every nonce is spent.
    floor: u64,
    /// Spent nonces above the floor.
    spent: BTreeSet<u64>,
    balance: u128,
}

impl Account {
    fn spend(&mut self, nonce: u64) {
        self.spent.insert(nonce);
        while self.spent.remove(&(self.floor + 1)) {
            self.floor += 1;
        }
    }
}

/// A node in a box.
#[derive(Default)]
struct InMemoryLedger {
    accounts: Mutex<HashMap<AccountAddress, Account>>,
    attempts: Mutex<Vec<(AccountAddress, u64)>>,
    jammed: Mutex<Option<CommitStatus>>,
}

impl InMemoryLedger {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn fund(&self, address: AccountAddress, balance: u128) {
        self.accounts.lock().entry(address).or_default().balance = balance;
    }

    fn balance(&self, address: &AccountAddress) -> u128 {
        self.accounts.lock().get(address).map_or(0, |a| a.balance)
    }

    /// Pretend another client spent nonces up to `nonce`.
    fn advance(&self, address: AccountAddress, nonce: u64) {
        let mut accounts = self.accounts.lock();
        let account = accounts.entry(address).or_default();
        for n in account.floor + 1..=nonce {
            account.spend(n);
        }
    }

    /// Reject every submission with `status` until unjammed.
    fn jam(&self, status: Option<CommitStatus>) {
        *self.jammed.lock() = status;
    }

    fn attempted_nonces(&self) -> Vec<u64> {
        self.attempts.lock().iter().map(|(_, n)| *n).collect()
    }

    fn reject(status: CommitStatus, detail: impl Into<String>) -> RpcError {
        RpcError::Commit(CommitError::new(status, detail))
    }
}

#[async_trait]
impl AccountStateReader for InMemoryLedger {
    async fn fetch_account_state(
        &self,
        address: &AccountAddress,
    ) -> Result<AccountState, RpcError> {
        let accounts = self.accounts.lock();
        let (floor, balance) = accounts
            .get(address)
            .map_or((0, 0), |a| (a.floor, a.balance));
        Ok(AccountState::new(*address, floor, balance))
    }
}

#[async_trait]
impl TransactionCommitter for InMemoryLedger {
    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<TxHash, RpcError> {
        let raw = tx.raw();
        self.attempts.lock().push((*raw.sender(), raw.nonce()));

        if let Some(status) = *self.jammed.lock() {
            return Err(Self::reject(status, format!("jammed at nonce {}", raw.nonce())));
        }

        verify_transaction(tx, &chain()).map_err(|e| match e {
            TransactionError::ChainIdMismatch { .. } => {
                Self::reject(CommitStatus::InvalidChainId, e.to_string())
            }
            TransactionError::InvalidSignature { .. } => {
                Self::reject(CommitStatus::InvalidSignature, e.to_string())
            }
            other => Self::reject(CommitStatus::InvalidHash, other.to_string()),
        })?;

        let mut accounts = self.accounts.lock();
        let sender = accounts.entry(*raw.sender()).or_default();
        if raw.nonce() <= sender.floor {
            return Err(Self::reject(
                CommitStatus::NonceTooLow,
                format!("nonce {} <= {}", raw.nonce(), sender.floor),
            ));
        }
        if sender.spent.contains(&raw.nonce()) {
            return Err(Self::reject(CommitStatus::DuplicateNonce, "nonce already used"));
        }
        let cost = raw.amount() + u128::from(raw.fee().limit) * raw.fee().price;
        if cost > sender.balance {
            return Err(Self::reject(
                CommitStatus::InsufficientBalance,
                format!("need {cost}, have {}", sender.balance),
            ));
        }

        sender.balance -= cost;
        sender.spend(raw.nonce());
        if let Some(recipient) = raw.recipient() {
            accounts.entry(*recipient).or_default().balance += raw.amount();
        }
        Ok(*tx.hash())
    }
}

fn config(try_count: u32) -> ClientConfig {
    ClientConfig {
        chain_id: Some(chain()),
        retry: RetryConfig {
            try_count,
            interval_ms: 1,
            retry_on_connection_error: false,
        },
        ..ClientConfig::default()
    }
}

/// A locked local wallet whose key is in the store under "hunter2".
fn local_wallet(
    ledger: &Arc<InMemoryLedger>,
    try_count: u32,
) -> (Wallet<LocalSigner>, AccountAddress) {
    let store = Arc::new(InMemoryKeyStore::new());
    let address = store
        .save(&KeyPair::generate(), &"hunter2".into())
        .unwrap();
    let wallet = Wallet::from_config(
        LocalSigner::new(store),
        &config(try_count),
        ledger.clone(),
        ledger.clone(),
    )
    .unwrap();
    (wallet, address)
}

async fn unlocked_wallet(
    ledger: &Arc<InMemoryLedger>,
    try_count: u32,
) -> (Wallet<LocalSigner>, AccountAddress) {
    let (wallet, address) = local_wallet(ledger, try_count);
    wallet.unlock(&address, &"hunter2".into()).await.unwrap();
    ledger.fund(address, 1_000_000);
    (wallet, address)
}

/// Custody service backed by a key store. Keys stay on its side.
#[derive(Default)]
struct StoreCustody {
    store: InMemoryKeyStore,
    unlocked: DashMap<AccountAddress, KeyPair>,
}

#[async_trait]
impl KeyCustody for StoreCustody {
    async fn unlock(
        &self,
        address: &AccountAddress,
        credential: &Credential,
    ) -> Result<(), CustodyError> {
        let key = self
            .store
            .load(address, credential)
            .map_err(|_| CustodyError::Authentication)?;
        self.unlocked.insert(*address, key);
        Ok(())
    }

    async fn lock(
        &self,
        address: &AccountAddress,
        _credential: &Credential,
    ) -> Result<(), CustodyError> {
        self.unlocked.remove(address);
        Ok(())
    }

    async fn sign(
        &self,
        address: &AccountAddress,
        raw: &RawTransaction,
    ) -> Result<Signature, CustodyError> {
        let key = self.unlocked.get(address).ok_or(CustodyError::Locked)?;
        key.sign_hash(raw.hash().as_bytes())
            .map_err(|e| CustodyError::Rejected(e.to_string()))
    }

    async fn sign_message(
        &self,
        address: &AccountAddress,
        message: &[u8],
    ) -> Result<Signature, CustodyError> {
        let key = self.unlocked.get(address).ok_or(CustodyError::Locked)?;
        key.sign(message)
            .map_err(|e| CustodyError::Rejected(e.to_string()))
    }

    async fn list(&self) -> Result<Vec<AccountAddress>, CustodyError> {
        Ok(self.store.identities())
    }
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_transfer_lifecycle() {
    let ledger = InMemoryLedger::new();
    let (wallet, alice) = unlocked_wallet(&ledger, 2).await;
    let bob = KeyPair::generate().address();

    let hash = wallet.send(bob, 250, Fee::new(10, 2)).await.unwrap();

    assert_ne!(hash, TxHash::from_bytes([0; 32]));
    assert_eq!(ledger.balance(&alice), 1_000_000 - 250 - 20);
    assert_eq!(ledger.balance(&bob), 250);
    assert_eq!(ledger.attempted_nonces(), vec![1]);
}

#[tokio::test]
async fn sequential_sends_advance_nonce() {
    let ledger = InMemoryLedger::new();
    let (wallet, _) = unlocked_wallet(&ledger, 2).await;
    let bob = KeyPair::generate().address();

    for _ in 0..5 {
        wallet.send(bob, 1, Fee::ZERO).await.unwrap();
    }
    assert_eq!(ledger.attempted_nonces(), vec![1, 2, 3, 4, 5]);
    assert_eq!(ledger.balance(&bob), 5);
}

// ---------------------------------------------------------------------------
// Nonce conflicts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_cache_recovers_after_one_rebind() {
    let ledger = InMemoryLedger::new();
    let (wallet, alice) = unlocked_wallet(&ledger, 2).await;
    let bob = KeyPair::generate().address();

    wallet.send(bob, 1, Fee::ZERO).await.unwrap();
    // Another device with the same key spends nonces 2..=5.
    ledger.advance(alice, 5);

    wallet.send(bob, 1, Fee::ZERO).await.unwrap();

    assert_eq!(ledger.attempted_nonces(), vec![1, 2, 6]);
    let metrics = wallet.requester().metrics().unwrap();
    assert_eq!(metrics.nonce_rebinds_total.get(), 1);
    assert_eq!(metrics.nonce_conflicts_total.get(), 1);
    assert_eq!(wallet.requester().nonces().last_used(&alice).await, 6);
}

#[tokio::test]
async fn persistent_duplicate_nonce_exhausts_budget() {
    let ledger = InMemoryLedger::new();
    let (wallet, _) = unlocked_wallet(&ledger, 2).await;
    ledger.jam(Some(CommitStatus::DuplicateNonce));

    let err = wallet
        .send(KeyPair::generate().address(), 1, Fee::ZERO)
        .await
        .unwrap_err();

    assert_eq!(ledger.attempted_nonces().len(), 3);
    match err {
        ClientError::RetryableConflict(e) => {
            assert_eq!(e.status, CommitStatus::DuplicateNonce);
            // The last attempt's rejection, not the first.
            let last = *ledger.attempted_nonces().last().unwrap();
            assert_eq!(e.detail, format!("jammed at nonce {last}"));
        }
        other => panic!("expected RetryableConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_sends_never_reuse_a_nonce() {
    let ledger = InMemoryLedger::new();
    let (wallet, alice) = unlocked_wallet(&ledger, 2).await;
    let wallet = Arc::new(wallet);
    let bob = KeyPair::generate().address();

    let sends = (0..40).map(|_| {
        let wallet = Arc::clone(&wallet);
        async move { wallet.send(bob, 1, Fee::ZERO).await }
    });
    let results = futures::future::join_all(sends).await;

    assert!(results.iter().all(Result::is_ok));
    let nonces: BTreeSet<_> = ledger.attempted_nonces().into_iter().collect();
    assert_eq!(nonces, (1..=40).collect::<BTreeSet<u64>>());
    assert_eq!(ledger.balance(&bob), 40);
    assert_eq!(wallet.requester().nonces().last_used(&alice).await, 40);
}

#[tokio::test]
async fn two_wallets_sharing_a_key_converge() {
    let ledger = InMemoryLedger::new();
    let store = Arc::new(InMemoryKeyStore::new());
    let key = KeyPair::generate();
    let alice = store.save(&key, &"pw".into()).unwrap();
    ledger.fund(alice, 1_000);

    let a = Wallet::from_config(
        LocalSigner::new(store.clone()),
        &config(3),
        ledger.clone(),
        ledger.clone(),
    )
    .unwrap();
    let b = Wallet::from_config(
        LocalSigner::new(store),
        &config(3),
        ledger.clone(),
        ledger.clone(),
    )
    .unwrap();
    a.unlock(&alice, &"pw".into()).await.unwrap();
    b.unlock(&alice, &"pw".into()).await.unwrap();
    let bob = KeyPair::generate().address();

    // Separate nonce caches. `b` seeds after `a` spent 1; `a` then
    // collides on 2 and rebinds.
    a.send(bob, 1, Fee::ZERO).await.unwrap();
    b.send(bob, 1, Fee::ZERO).await.unwrap();
    a.send(bob, 1, Fee::ZERO).await.unwrap();

    assert_eq!(ledger.balance(&bob), 3);
    assert_eq!(ledger.attempted_nonces(), vec![1, 2, 2, 3]);
}

// ---------------------------------------------------------------------------
// Fatal outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn insufficient_balance_is_fatal() {
    let ledger = InMemoryLedger::new();
    let (wallet, alice) = unlocked_wallet(&ledger, 2).await;

    let err = wallet
        .send(KeyPair::generate().address(), 5_000_000, Fee::ZERO)
        .await
        .unwrap_err();

    assert!(matches!(
        err.commit_error().map(|e| e.status),
        Some(CommitStatus::InsufficientBalance)
    ));
    assert_eq!(ledger.attempted_nonces(), vec![1]);
    assert_eq!(ledger.balance(&alice), 1_000_000);
    assert_eq!(wallet.requester().metrics().unwrap().nonce_rebinds_total.get(), 0);
}

#[tokio::test]
async fn wrong_chain_is_refused_locally() {
    let ledger = InMemoryLedger::new();
    let (wallet, _) = unlocked_wallet(&ledger, 2).await;
    let template = TxTemplate::transfer(KeyPair::generate().address(), 1)
        .with_chain_id(ChainIdHash::of(b"some-other-chain"));

    let err = wallet.commit(template).await.unwrap_err();

    assert!(matches!(err, ClientError::ChainIdMismatch { .. }));
    assert!(ledger.attempted_nonces().is_empty());
}

#[tokio::test]
async fn wrong_credential_leaves_signer_locked() {
    let ledger = InMemoryLedger::new();
    let (wallet, alice) = local_wallet(&ledger, 2);

    let err = wallet.unlock(&alice, &"hunter3".into()).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Signer(SignerError::Authentication { address }) if address == alice
    ));

    let raw = TxTemplate::transfer(KeyPair::generate().address(), 1)
        .to_raw(chain(), alice, 1)
        .unwrap();
    assert_eq!(
        wallet.signer().sign(&raw).await.unwrap_err(),
        SignerError::Locked
    );
    assert!(ledger.attempted_nonces().is_empty());
}

// ---------------------------------------------------------------------------
// Remote custody
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remote_signer_sends_without_holding_the_key() {
    let ledger = InMemoryLedger::new();
    let custody = Arc::new(StoreCustody::default());
    let alice = custody
        .store
        .save(&KeyPair::generate(), &"pw".into())
        .unwrap();
    ledger.fund(alice, 100);

    let wallet = Wallet::from_config(
        RemoteSigner::new(custody.clone()),
        &config(2),
        ledger.clone(),
        ledger.clone(),
    )
    .unwrap();

    assert_eq!(wallet.lock().await.unwrap(), LockOutcome::NothingToLock);
    wallet.unlock(&alice, &"pw".into()).await.unwrap();
    wallet
        .send(KeyPair::generate().address(), 10, Fee::ZERO)
        .await
        .unwrap();
    assert_eq!(ledger.balance(&alice), 90);

    assert_eq!(wallet.lock().await.unwrap(), LockOutcome::Locked);
    assert_eq!(wallet.lock().await.unwrap(), LockOutcome::NothingToLock);
    assert!(custody.unlocked.is_empty());
}

#[tokio::test]
async fn remote_and_local_signatures_agree_on_verification() {
    let custody = Arc::new(StoreCustody::default());
    let key = KeyPair::generate();
    let alice = custody.store.save(&key, &"pw".into()).unwrap();

    let remote = RemoteSigner::new(custody);
    remote.unlock(&alice, &"pw".into()).await.unwrap();
    let local = LocalSigner::from_key_pair(key);

    let from_remote = remote.sign_message(b"hello").await.unwrap();
    assert!(local.verify_message(b"hello", &from_remote).await.unwrap());
    let from_local = local.sign_message(b"hello").await.unwrap();
    assert!(remote.verify_message(b"hello", &from_local).await.unwrap());
}

// ---------------------------------------------------------------------------
// Keys and text forms
// ---------------------------------------------------------------------------

#[test]
fn exported_key_imports_on_another_store() {
    let source = InMemoryKeyStore::new();
    let key = KeyPair::generate();
    let address = source.save(&key, &"pw".into()).unwrap();

    let sealed = source.export(&address, &"pw".into()).unwrap();
    let text = sealed.encode();

    let imported = KeyPair::import(&text.parse().unwrap(), b"pw").unwrap();
    assert_eq!(imported.address(), address);
    assert_eq!(
        KeyPair::import(&text.parse().unwrap(), b"wrong").unwrap_err(),
        KeyError::Authentication
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn private_key_text_round_trips(bytes in prop::array::uniform32(any::<u8>())) {
        let key = KeyPair::from_bytes(&bytes);
        prop_assume!(key.is_ok());
        let key = key.unwrap();

        let decoded = KeyPair::decode(&key.encode()).unwrap();
        prop_assert_eq!(decoded.address(), key.address());
        prop_assert_eq!(
            AccountAddress::decode(&key.address().encode()).unwrap(),
            key.address()
        );
    }

    #[test]
    fn address_is_not_a_private_key(bytes in prop::array::uniform32(any::<u8>())) {
        let key = KeyPair::from_bytes(&bytes);
        prop_assume!(key.is_ok());
        let address_text = key.unwrap().address().encode();

        let err = KeyPair::decode(&address_text).unwrap_err();
        let is_version_mismatch = matches!(
            err,
            KeyError::Decoding(EncodingError::VersionMismatch { .. })
        );
        prop_assert!(is_version_mismatch);
    }
}
