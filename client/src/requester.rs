//! # Transaction Requester
//!
//! Allocates a nonce, hands it to a caller-supplied `build_and_submit`
//! closure, and retries when the node says the nonce was wrong.
//!
//! ## Retry Model
//!
//! Only two rejections are worth another attempt: `NONCE_TOO_LOW` and
//! `DUPLICATE_NONCE`. Both mean the local nonce cache drifted from the
//! ledger, which a fresh account state fixes. Every other rejection is
//! returned unchanged on the spot. Connection failures are fatal as well
//! unless the [`RetryPolicy`] opts into retrying them.
//!
//! ```text
//!   allocate ──▶ submit ──▶ committed
//!                  │
//!                  ├── fatal ─────────────────────────▶ error
//!                  │
//!                  └── conflict ──▶ budget left? ─no──▶ last conflict
//!                                        │yes
//!                    fetch state ◀───────┘
//!                         │
//!                       sleep
//!                         │
//!                rebind + allocate ──▶ submit ...
//! ```
//!
//! A request makes at most `1 + try_count` submissions. When the budget
//! runs out the caller gets the node's last rejection verbatim, not a
//! synthetic "gave up" error.
//!
//! Dropping the returned future cancels the request. The rebind happens
//! after the sleep, so a request cancelled mid-sleep leaves the nonce cache
//! at its last allocation.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::crypto::address::AccountAddress;
use crate::error::{ClientError, Result};
use crate::metrics::ClientMetrics;
use crate::nonce::NonceProvider;
use crate::rpc::{AccountStateReader, TransactionCommitter};
use crate::signer::{Signer, SignerError};
use crate::transaction::builder::RawTransaction;
use crate::transaction::signing::SignedTransaction;
use crate::transaction::types::{ChainIdHash, Fee, TxHash, TxType};
use crate::transaction::verification::TransactionError;

// ---------------------------------------------------------------------------
// Outcome classification
// ---------------------------------------------------------------------------

/// What one submission amounted to, from the retry loop's point of view.
#[derive(Debug)]
pub enum CommitOutcome {
    Success(TxHash),
    /// Worth another attempt with a fresh nonce.
    RetryableConflict(ClientError),
    Fatal(ClientError),
}

impl CommitOutcome {
    pub fn classify(result: Result<TxHash>, policy: &RetryPolicy) -> Self {
        match result {
            Ok(hash) => CommitOutcome::Success(hash),
            Err(err @ ClientError::RetryableConflict(_)) => CommitOutcome::RetryableConflict(err),
            Err(err @ ClientError::Connection(_)) if policy.retry_on_connection_error() => {
                CommitOutcome::RetryableConflict(err)
            }
            Err(err) => CommitOutcome::Fatal(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Everything about a transaction except who sends it and at which nonce.
///
/// [`TxRequester::send`] fills those in on each attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxTemplate {
    /// Falls back to the requester's chain when unset.
    pub chain_id: Option<ChainIdHash>,
    pub recipient: Option<AccountAddress>,
    pub amount: u128,
    pub fee: Fee,
    pub payload: Vec<u8>,
    pub tx_type: TxType,
}

impl TxTemplate {
    /// A plain value transfer.
    pub fn transfer(recipient: AccountAddress, amount: u128) -> Self {
        Self {
            recipient: Some(recipient),
            amount,
            ..Self::default()
        }
    }

    pub fn with_chain_id(mut self, chain_id: ChainIdHash) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_fee(mut self, fee: Fee) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_tx_type(mut self, tx_type: TxType) -> Self {
        self.tx_type = tx_type;
        self
    }

    /// Fill in the blanks.
    pub fn to_raw(
        &self,
        chain_id: ChainIdHash,
        sender: AccountAddress,
        nonce: u64,
    ) -> std::result::Result<RawTransaction, TransactionError> {
        let mut builder = RawTransaction::builder()
            .chain_id(chain_id)
            .sender(sender)
            .amount(self.amount)
            .nonce(nonce)
            .fee(self.fee)
            .payload(self.payload.clone())
            .tx_type(self.tx_type);
        if let Some(recipient) = self.recipient {
            builder = builder.recipient(recipient);
        }
        builder.build()
    }
}

// ---------------------------------------------------------------------------
// TxRequester
// ---------------------------------------------------------------------------

/// Drives transactions through nonce allocation, submission and retry.
///
/// Holds no per-request state, so one requester serves any number of
/// concurrent requests. Requests for the same sender serialize only inside
/// the [`NonceProvider`], and only for as long as an allocation takes.
pub struct TxRequester {
    policy: RetryPolicy,
    nonces: Arc<NonceProvider>,
    reader: Arc<dyn AccountStateReader>,
    chain_id: Option<ChainIdHash>,
    metrics: Option<ClientMetrics>,
}

impl TxRequester {
    pub fn new(
        policy: RetryPolicy,
        nonces: Arc<NonceProvider>,
        reader: Arc<dyn AccountStateReader>,
    ) -> Self {
        Self {
            policy,
            nonces,
            reader,
            chain_id: None,
            metrics: None,
        }
    }

    /// Pin the chain this requester submits to. Templates and signed
    /// transactions for any other chain are refused.
    pub fn with_chain_id(mut self, chain_id: ChainIdHash) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_metrics(mut self, metrics: ClientMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn nonces(&self) -> &Arc<NonceProvider> {
        &self.nonces
    }

    pub fn chain_id(&self) -> Option<&ChainIdHash> {
        self.chain_id.as_ref()
    }

    pub fn metrics(&self) -> Option<&ClientMetrics> {
        self.metrics.as_ref()
    }

    /// Run `build_and_submit` with a freshly allocated nonce, retrying on
    /// nonce conflicts.
    ///
    /// The closure gets the signer and the nonce to use, and should build,
    /// sign and submit one transaction. Its node errors should arrive as
    /// [`ClientError`] via `From<RpcError>`, which is what tells a conflict
    /// apart from a fatal rejection.
    pub async fn request<S, F, Fut>(&self, signer: Arc<S>, build_and_submit: F) -> Result<TxHash>
    where
        S: Signer + ?Sized,
        F: FnMut(Arc<S>, u64) -> Fut,
        Fut: Future<Output = Result<TxHash>>,
    {
        let started = Instant::now();
        let result = async {
            let address = signer.principal()?;
            let nonce = self.nonces.increment_and_get(&address).await?;
            self.submit_loop(signer, address, nonce, self.policy.try_count(), build_and_submit)
                .await
        }
        .await;
        self.record(result.is_ok(), started);
        result
    }

    /// Build a transaction from `template`, sign it and submit it through
    /// `committer`, with the usual retries.
    ///
    /// A template for a chain other than the requester's is refused before
    /// any nonce is allocated.
    pub async fn send<S>(
        &self,
        signer: Arc<S>,
        committer: Arc<dyn TransactionCommitter>,
        template: TxTemplate,
    ) -> Result<TxHash>
    where
        S: Signer + ?Sized,
    {
        let chain_id = match self.resolve_chain(template.chain_id) {
            Ok(chain_id) => chain_id,
            Err(err) => {
                self.record(false, Instant::now());
                return Err(err);
            }
        };

        self.request(signer, move |signer, nonce| {
            let committer = Arc::clone(&committer);
            let raw = signer
                .principal()
                .map_err(ClientError::from)
                .and_then(|sender| Ok(template.to_raw(chain_id, sender, nonce)?));
            async move {
                let signed = signer.sign(&raw?).await?;
                Ok::<_, ClientError>(committer.submit_transaction(&signed).await?)
            }
        })
        .await
    }

    /// Submit an already signed transaction. If the node rejects its nonce,
    /// fall back to `build_and_submit` with fresh nonces, same budget as
    /// [`request`](Self::request) with the initial submission counted as
    /// the first attempt.
    pub async fn resubmit<S, F, Fut>(
        &self,
        signer: Arc<S>,
        committer: Arc<dyn TransactionCommitter>,
        signed: SignedTransaction,
        build_and_submit: F,
    ) -> Result<TxHash>
    where
        S: Signer + ?Sized,
        F: FnMut(Arc<S>, u64) -> Fut,
        Fut: Future<Output = Result<TxHash>>,
    {
        let started = Instant::now();
        let result = async {
            if let Some(expected) = self.chain_id {
                let actual = *signed.raw().chain_id();
                if actual != expected {
                    return Err(ClientError::ChainIdMismatch { expected, actual });
                }
            }

            let address = *signed.raw().sender();
            let principal = signer.principal()?;
            if address != principal {
                return Err(SignerError::SenderMismatch {
                    expected: principal,
                    actual: address,
                }
                .into());
            }

            self.count_attempt();
            let first = committer
                .submit_transaction(&signed)
                .await
                .map_err(ClientError::from);

            match CommitOutcome::classify(first, &self.policy) {
                CommitOutcome::Success(hash) => Ok(hash),
                CommitOutcome::Fatal(err) => Err(err),
                CommitOutcome::RetryableConflict(err) => {
                    self.count_conflict(&err);
                    let Some(remaining) = self.policy.try_count().checked_sub(1) else {
                        return Err(err);
                    };
                    debug!(%address, nonce = signed.nonce(), error = %err, "resubmission conflicted");
                    let nonce = self.rebind_after_conflict(&address).await?;
                    self.submit_loop(signer, address, nonce, remaining, build_and_submit)
                        .await
                }
            }
        }
        .await;
        self.record(result.is_ok(), started);
        result
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn submit_loop<S, F, Fut>(
        &self,
        signer: Arc<S>,
        address: AccountAddress,
        mut nonce: u64,
        mut attempts_left: u32,
        mut build_and_submit: F,
    ) -> Result<TxHash>
    where
        S: Signer + ?Sized,
        F: FnMut(Arc<S>, u64) -> Fut,
        Fut: Future<Output = Result<TxHash>>,
    {
        loop {
            self.count_attempt();
            let result = build_and_submit(Arc::clone(&signer), nonce).await;

            match CommitOutcome::classify(result, &self.policy) {
                CommitOutcome::Success(hash) => {
                    info!(%address, nonce, hash = %hash, "transaction committed");
                    return Ok(hash);
                }
                CommitOutcome::Fatal(err) => {
                    warn!(%address, nonce, error = %err, "transaction failed");
                    return Err(err);
                }
                CommitOutcome::RetryableConflict(err) => {
                    self.count_conflict(&err);
                    if attempts_left == 0 {
                        warn!(%address, nonce, error = %err, "retries exhausted");
                        return Err(err);
                    }
                    attempts_left -= 1;
                    debug!(
                        %address,
                        nonce,
                        attempts_left,
                        error = %err,
                        "retrying with a fresh nonce"
                    );
                    nonce = self.rebind_after_conflict(&address).await?;
                }
            }
        }
    }

    /// Fetch the ledger's view, wait out the interval, then rebind and
    /// allocate in one step.
    async fn rebind_after_conflict(&self, address: &AccountAddress) -> Result<u64> {
        let state = self.reader.fetch_account_state(address).await?;
        tokio::time::sleep(self.policy.interval()).await;
        let nonce = self.nonces.rebind_and_increment(&state).await?;
        if let Some(metrics) = &self.metrics {
            metrics.nonce_rebinds_total.inc();
        }
        debug!(%address, ledger_nonce = state.nonce, nonce, "rebound after conflict");
        Ok(nonce)
    }

    fn resolve_chain(&self, requested: Option<ChainIdHash>) -> Result<ChainIdHash> {
        match (self.chain_id, requested) {
            (Some(expected), Some(actual)) if expected != actual => {
                warn!(%expected, %actual, "refusing transaction for another chain");
                Err(ClientError::ChainIdMismatch { expected, actual })
            }
            (Some(chain_id), _) | (None, Some(chain_id)) => Ok(chain_id),
            (None, None) => Err(TransactionError::MissingField("chain_id").into()),
        }
    }

    fn count_attempt(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.submit_attempts_total.inc();
        }
    }

    fn count_conflict(&self, err: &ClientError) {
        if let (Some(metrics), true) = (&self.metrics, err.is_retryable_conflict()) {
            metrics.nonce_conflicts_total.inc();
        }
    }

    fn record(&self, succeeded: bool, started: Instant) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        if succeeded {
            metrics.requests_succeeded_total.inc();
        } else {
            metrics.requests_failed_total.inc();
        }
        metrics
            .request_latency_seconds
            .observe(started.elapsed().as_secs_f64());
    }
}

impl std::fmt::Debug for TxRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxRequester")
            .field("policy", &self.policy)
            .field("chain_id", &self.chain_id)
            .field("nonces", &self.nonces)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
