//! # Wallet
//!
//! One account-facing handle over a signer and a node connection. The
//! signer is injected, so the same wallet code drives a [`LocalSigner`]
//! with an in-process key store or a [`RemoteSigner`] talking to custody.
//!
//! ## Nonce Model
//!
//! The wallet never picks nonces itself. Every send goes through its
//! [`TxRequester`], which allocates from a shared [`NonceProvider`] and
//! rebinds to the node's account state on conflict. Several wallets can
//! share one provider; they then never hand out the same nonce twice for
//! the same address.
//!
//! [`LocalSigner`]: crate::signer::LocalSigner
//! [`RemoteSigner`]: crate::signer::RemoteSigner

use std::sync::Arc;

use tracing::info;

use crate::config::{ClientConfig, ConfigError};
use crate::crypto::address::AccountAddress;
use crate::crypto::signatures::Signature;
use crate::error::Result;
use crate::metrics::ClientMetrics;
use crate::nonce::NonceProvider;
use crate::requester::{TxRequester, TxTemplate};
use crate::rpc::{AccountStateReader, TransactionCommitter};
use crate::signer::{Credential, LockOutcome, SignerLifecycle};
use crate::transaction::types::{Fee, TxHash};

pub struct Wallet<S> {
    signer: Arc<S>,
    requester: TxRequester,
    committer: Arc<dyn TransactionCommitter>,
}

impl<S: SignerLifecycle + 'static> Wallet<S> {
    pub fn new(
        signer: S,
        requester: TxRequester,
        committer: Arc<dyn TransactionCommitter>,
    ) -> Self {
        Self {
            signer: Arc::new(signer),
            requester,
            committer,
        }
    }

    /// Wire a wallet from configuration: retry policy, chain and metrics
    /// prefix all come from `config`.
    pub fn from_config(
        signer: S,
        config: &ClientConfig,
        reader: Arc<dyn AccountStateReader>,
        committer: Arc<dyn TransactionCommitter>,
    ) -> Result<Self> {
        config.validate()?;
        let nonces = Arc::new(NonceProvider::new(Arc::clone(&reader)));
        let metrics = ClientMetrics::new(&config.metrics_prefix)
            .map_err(|e| ConfigError::Invalid(format!("metrics: {e}")))?;

        let mut requester =
            TxRequester::new(config.retry_policy()?, nonces, reader).with_metrics(metrics);
        if let Some(chain_id) = config.chain_id {
            requester = requester.with_chain_id(chain_id);
        }
        Ok(Self::new(signer, requester, committer))
    }

    pub fn signer(&self) -> &Arc<S> {
        &self.signer
    }

    pub fn requester(&self) -> &TxRequester {
        &self.requester
    }

    pub async fn unlock(
        &self,
        address: &AccountAddress,
        credential: &Credential,
    ) -> Result<AccountAddress> {
        let unlocked = self.signer.unlock(address, credential).await?;
        info!(address = %unlocked, "wallet unlocked");
        Ok(unlocked)
    }

    pub async fn lock(&self) -> Result<LockOutcome> {
        Ok(self.signer.lock().await?)
    }

    pub fn principal(&self) -> Result<AccountAddress> {
        Ok(self.signer.principal()?)
    }

    pub fn is_unlocked(&self) -> bool {
        self.signer.is_unlocked()
    }

    /// Transfer `amount` to `recipient`.
    pub async fn send(
        &self,
        recipient: AccountAddress,
        amount: u128,
        fee: Fee,
    ) -> Result<TxHash> {
        self.commit(TxTemplate::transfer(recipient, amount).with_fee(fee))
            .await
    }

    /// Transfer with an attached payload.
    pub async fn send_with_payload(
        &self,
        recipient: AccountAddress,
        amount: u128,
        fee: Fee,
        payload: impl Into<Vec<u8>>,
    ) -> Result<TxHash> {
        let template = TxTemplate::transfer(recipient, amount)
            .with_fee(fee)
            .with_payload(payload);
        self.commit(template).await
    }

    /// Submit an arbitrary template as the unlocked account.
    pub async fn commit(&self, template: TxTemplate) -> Result<TxHash> {
        self.requester
            .send(
                Arc::clone(&self.signer),
                Arc::clone(&self.committer),
                template,
            )
            .await
    }

    pub async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        Ok(self.signer.sign_message(message).await?)
    }

    /// Sign a text message; the signature comes back as base64.
    pub async fn sign_message_text(&self, message: &str) -> Result<String> {
        Ok(self.signer.sign_message_text(message).await?)
    }
}

impl<S> std::fmt::Debug for Wallet<S>
where
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("signer", &self.signer)
            .field("requester", &self.requester)
            .finish_non_exhaustive()
    }
}
