//! # Nonce Provider
//!
//! Hands out nonces for outgoing transactions without asking the node
//! every time.
//!
//! The node owns the truth: the nonce of the last transaction it accepted
//! from each account. We keep a local guess per address, seed it from the
//! node on first use, and bump it optimistically for every allocation. When
//! the node disagrees (nonce too low, duplicate nonce) the requester rebinds
//! the guess to a fresh authoritative read and carries on.
//!
//! ## Locking
//!
//! One async mutex per address, held inside a concurrent map. Two tasks
//! allocating for the same account serialize on that account only; tasks
//! for different accounts never contend. The lock is held across the
//! first-use seeding read so that two racing first allocations can't both
//! seed and hand out the same value.
//!
//! [`NonceProvider::rebind_and_increment`] overwrites and allocates inside a
//! single critical section, so nothing can slip in between the rebind and
//! the retry that depends on it.
//!
//! ## Lifetime
//!
//! Entries live as long as the provider. An entry is never dropped behind
//! the caller's back: a fresh seed only reflects nonces the node already
//! accepted, so re-seeding an address with unconfirmed allocations would
//! hand the same nonce out again. [`NonceProvider::forget`] is the only way
//! to drop one.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::crypto::address::AccountAddress;
use crate::rpc::{AccountState, AccountStateReader, RpcError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NonceError {
    /// Seeding needed the node and the node didn't answer.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("nonce space exhausted for {address}")]
    Overflow { address: AccountAddress },
}

/// One cached address. `None` until seeded.
#[derive(Debug, Default)]
struct NonceSlot {
    last_used: Mutex<Option<u64>>,
}

/// Per-address nonce cache with optimistic allocation and authoritative
/// rebind.
pub struct NonceProvider {
    reader: Arc<dyn AccountStateReader>,
    slots: DashMap<AccountAddress, Arc<NonceSlot>>,
}

impl NonceProvider {
    pub fn new(reader: Arc<dyn AccountStateReader>) -> Self {
        Self {
            reader,
            slots: DashMap::new(),
        }
    }

    /// Allocate the next nonce for `address`.
    ///
    /// On first use the node is asked for the account state and the
    /// allocation is `state.nonce + 1`. After that it's the cached value
    /// plus one, no network involved.
    pub async fn increment_and_get(&self, address: &AccountAddress) -> Result<u64, NonceError> {
        let slot = self.slot(address);
        let mut last_used = slot.last_used.lock().await;

        let base = match *last_used {
            Some(value) => value,
            None => {
                let state = self.reader.fetch_account_state(address).await?;
                debug!(%address, nonce = state.nonce, "seeded nonce from account state");
                state.nonce
            }
        };

        let next = base
            .checked_add(1)
            .ok_or(NonceError::Overflow { address: *address })?;
        *last_used = Some(next);
        trace!(%address, nonce = next, "allocated nonce");
        Ok(next)
    }

    /// Overwrite the cached value with the node's view, discarding any
    /// local allocations the node never confirmed.
    pub async fn rebind(&self, state: &AccountState) {
        self.bind(&state.address, state.nonce).await;
    }

    /// Rebind to `state` and allocate the next nonce in one critical
    /// section. Returns `state.nonce + 1`.
    pub async fn rebind_and_increment(&self, state: &AccountState) -> Result<u64, NonceError> {
        let slot = self.slot(&state.address);
        let mut last_used = slot.last_used.lock().await;

        let next = state.nonce.checked_add(1).ok_or(NonceError::Overflow {
            address: state.address,
        })?;
        debug!(
            address = %state.address,
            stale = ?*last_used,
            nonce = state.nonce,
            "rebound nonce"
        );
        *last_used = Some(next);
        Ok(next)
    }

    /// Set the last used nonce for `address` explicitly.
    pub async fn bind(&self, address: &AccountAddress, nonce: u64) {
        let slot = self.slot(address);
        let mut last_used = slot.last_used.lock().await;
        debug!(%address, stale = ?*last_used, nonce, "rebound nonce");
        *last_used = Some(nonce);
    }

    /// Last nonce handed out (or bound) for `address`; 0 if the address is
    /// not cached. Does not seed and does not count as a use.
    pub async fn last_used(&self, address: &AccountAddress) -> u64 {
        let slot = self.slots.get(address).map(|entry| Arc::clone(entry.value()));
        match slot {
            Some(slot) => slot.last_used.lock().await.unwrap_or(0),
            None => 0,
        }
    }

    /// Drop the cached value; the next allocation re-seeds from the node.
    pub fn forget(&self, address: &AccountAddress) {
        self.slots.remove(address);
    }

    /// Number of cached addresses.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fetch (or create) the slot for `address`.
    fn slot(&self, address: &AccountAddress) -> Arc<NonceSlot> {
        Arc::clone(self.slots.entry(*address).or_default().value())
    }
}

impl std::fmt::Debug for NonceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceProvider")
            .field("cached", &self.slots.len())
            .finish()
    }
}
