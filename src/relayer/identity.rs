//! The relayer account: signing key, native balance and transaction nonce.
//!
//! # Concurrency
//! Exactly one [`IdentityLease`] exists at a time. Whoever holds it owns the
//! nonce sequence: it reads the next nonce, signs, broadcasts and commits
//! before letting go. Dropping the lease releases it, so an early return or
//! a panic inside the critical section can't wedge the relayer.
//!
//! # Nonce cache
//! ```text
//! None ──(pending_nonce)──▶ Some(n) ──commit(n)──▶ Some(n+1)
//!   ▲                                                  │
//!   └──────────────────── reset() ◀────────────────────┘
//! ```

use alloy::primitives::{Address, U256};
use alloy::rpc::types::TransactionRequest;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::blockchain::backend::ChainBackend;
use crate::blockchain::types::{BlockchainResult, SignedTransaction};
use crate::blockchain::wallet::Wallet;

#[derive(Debug, Default)]
struct NonceState {
    /// Next nonce to use, `None` until synced from the node.
    next: Option<u64>,
}

/// Shared handle to the relayer account.
#[derive(Clone)]
pub struct RelayerIdentity {
    wallet: Wallet,
    backend: Arc<dyn ChainBackend>,
    min_balance: U256,
    state: Arc<Mutex<NonceState>>,
}

impl RelayerIdentity {
    pub fn new(wallet: Wallet, backend: Arc<dyn ChainBackend>, min_balance: U256) -> Self {
        Self {
            wallet,
            backend,
            min_balance,
            state: Arc::new(Mutex::new(NonceState::default())),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Minimum native balance (wei) required to submit.
    pub fn min_balance_threshold(&self) -> U256 {
        self.min_balance
    }

    /// Live native balance from the chain.
    pub async fn current_balance(&self) -> BlockchainResult<U256> {
        self.backend.balance(self.wallet.address()).await
    }

    /// A balance exactly at the threshold is sufficient.
    pub fn has_sufficient_balance(&self, balance: U256) -> bool {
        balance >= self.min_balance
    }

    /// Wait for exclusive use of the relayer account.
    pub async fn acquire(&self) -> IdentityLease {
        let guard = self.state.clone().lock_owned().await;
        tracing::trace!(relayer = %self.wallet.address(), "Relayer lease acquired");
        IdentityLease {
            guard,
            wallet: self.wallet.clone(),
            backend: self.backend.clone(),
        }
    }

    /// Run `f` while holding the lease. The lease is released when the
    /// returned future completes, whatever its result.
    pub async fn with_exclusive_access<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce(IdentityLease) -> Fut,
        Fut: Future<Output = T>,
    {
        let lease = self.acquire().await;
        f(lease).await
    }
}

impl std::fmt::Debug for RelayerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerIdentity")
            .field("address", &self.wallet.address())
            .field("min_balance", &self.min_balance)
            .finish()
    }
}

/// Exclusive access to the relayer's nonce sequence.
pub struct IdentityLease {
    guard: OwnedMutexGuard<NonceState>,
    wallet: Wallet,
    backend: Arc<dyn ChainBackend>,
}

impl IdentityLease {
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub async fn balance(&self) -> BlockchainResult<U256> {
        self.backend.balance(self.wallet.address()).await
    }

    /// Next nonce to sign with, syncing from the node's pending count when
    /// the cache is empty.
    pub async fn next_nonce(&mut self) -> BlockchainResult<u64> {
        if let Some(nonce) = self.guard.next {
            return Ok(nonce);
        }
        let nonce = self.backend.pending_nonce(self.wallet.address()).await?;
        tracing::debug!(relayer = %self.wallet.address(), nonce, "Synced relayer nonce from chain");
        self.guard.next = Some(nonce);
        Ok(nonce)
    }

    /// Record that `used` was accepted by the node.
    pub fn commit(&mut self, used: u64) {
        self.guard.next = Some(used + 1);
    }

    /// Forget the cached nonce; the next caller re-reads it from the chain.
    pub fn reset(&mut self) {
        tracing::debug!(relayer = %self.wallet.address(), "Relayer nonce cache reset");
        self.guard.next = None;
    }

    pub async fn sign(&self, tx: TransactionRequest) -> BlockchainResult<SignedTransaction> {
        self.wallet.sign_transaction(tx).await
    }
}

impl Drop for IdentityLease {
    fn drop(&mut self) {
        tracing::trace!(relayer = %self.wallet.address(), "Relayer lease released");
    }
}
