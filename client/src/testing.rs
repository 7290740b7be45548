//! Scripted node double shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::crypto::address::AccountAddress;
use crate::rpc::{AccountState, AccountStateReader, RpcError, TransactionCommitter};
use crate::transaction::signing::SignedTransaction;
use crate::transaction::types::TxHash;

/// Answers state reads from a table and submissions from a script.
///
/// Submissions pop the next scripted outcome; once the script runs dry
/// every submission succeeds with the transaction's own hash.
#[derive(Default)]
pub struct FakeLedger {
    nonces: DashMap<AccountAddress, u64>,
    state_reads: AtomicUsize,
    fail_state_reads: AtomicBool,
    script: Mutex<VecDeque<Result<(), RpcError>>>,
    submissions: Mutex<Vec<SignedTransaction>>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_nonce(&self, address: &AccountAddress, nonce: u64) {
        self.nonces.insert(*address, nonce);
    }

    pub fn fail_state_reads(&self, fail: bool) {
        self.fail_state_reads.store(fail, Ordering::SeqCst);
    }

    pub fn state_reads(&self) -> usize {
        self.state_reads.load(Ordering::SeqCst)
    }

    pub fn script(&self, outcomes: impl IntoIterator<Item = Result<(), RpcError>>) {
        self.script.lock().extend(outcomes);
    }

    pub fn submissions(&self) -> Vec<SignedTransaction> {
        self.submissions.lock().clone()
    }

    pub fn submitted_nonces(&self) -> Vec<u64> {
        self.submissions.lock().iter().map(|tx| tx.nonce()).collect()
    }
}

#[async_trait]
impl AccountStateReader for FakeLedger {
    async fn fetch_account_state(
        &self,
        address: &AccountAddress,
    ) -> Result<AccountState, RpcError> {
        self.state_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_state_reads.load(Ordering::SeqCst) {
            return Err(RpcError::Connection("state read refused".into()));
        }
        let nonce = self.nonces.get(address).map(|n| *n).unwrap_or(0);
        Ok(AccountState::new(*address, nonce, 1_000_000))
    }
}

#[async_trait]
impl TransactionCommitter for FakeLedger {
    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<TxHash, RpcError> {
        self.submissions.lock().push(tx.clone());
        let outcome = self.script.lock().pop_front().unwrap_or(Ok(()));
        outcome.map(|()| *tx.hash())
    }
}
