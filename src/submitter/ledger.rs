//! In-memory record of submission attempts.
//!
//! Retention is enforced on insert: attempts idle past the retention window
//! are dropped, and past the entry cap finished attempts go oldest first.
//! In-flight attempts are only dropped by age.

use alloy::primitives::TxHash;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::RelayerConfig;
use crate::submitter::attempt::{TransactionAttempt, TransitionError};

/// Inserts between age sweeps when the ledger is under its cap.
const SWEEP_EVERY: u64 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age: Duration,
    pub max_entries: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(86_400),
            max_entries: 10_000,
        }
    }
}

impl From<&RelayerConfig> for RetentionPolicy {
    fn from(config: &RelayerConfig) -> Self {
        Self {
            max_age: Duration::from_secs(config.ledger_retention_secs),
            max_entries: config.ledger_max_entries,
        }
    }
}

/// Attempts by id, plus a hash → attempt index filled at broadcast.
#[derive(Clone, Default)]
pub struct AttemptLedger {
    attempts: Arc<DashMap<Uuid, TransactionAttempt>>,
    by_hash: Arc<DashMap<TxHash, Uuid>>,
    retention: RetentionPolicy,
    inserts: Arc<AtomicU64>,
}

impl AttemptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    pub fn insert(&self, attempt: TransactionAttempt) {
        if let Some(hash) = attempt.hash {
            self.by_hash.insert(hash, attempt.id);
        }
        self.attempts.insert(attempt.id, attempt);

        let inserted = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if self.attempts.len() > self.retention.max_entries || inserted % SWEEP_EVERY == 0 {
            self.prune_at(Instant::now());
        }
    }

    /// Evict per the retention policy as of `now`. Returns the number evicted.
    pub fn prune_at(&self, now: Instant) -> usize {
        let mut entries: Vec<_> = self
            .attempts
            .iter()
            .map(|r| {
                let a = r.value();
                (a.updated_at, a.id, a.hash, a.status.is_terminal())
            })
            .collect();
        entries.sort_by_key(|e| e.0);

        let mut excess = entries.len().saturating_sub(self.retention.max_entries);
        let mut evicted = 0;
        for (updated_at, id, hash, terminal) in entries {
            let expired = now.saturating_duration_since(updated_at) >= self.retention.max_age;
            if expired || (terminal && excess > 0) {
                self.remove(id, hash);
                excess = excess.saturating_sub(1);
                evicted += 1;
            } else if excess == 0 {
                break;
            }
        }

        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.attempts.len(), "Pruned attempt ledger");
        }
        evicted
    }

    fn remove(&self, id: Uuid, hash: Option<TxHash>) {
        self.attempts.remove(&id);
        if let Some(hash) = hash {
            self.by_hash.remove_if(&hash, |_, owner| *owner == id);
        }
    }

    /// Apply `f` to a stored attempt and keep the hash index current.
    pub fn update<F, T>(&self, id: Uuid, f: F) -> Option<T>
    where
        F: FnOnce(&mut TransactionAttempt) -> T,
    {
        let mut entry = self.attempts.get_mut(&id)?;
        let result = f(entry.value_mut());
        if let Some(hash) = entry.hash {
            self.by_hash.insert(hash, id);
        }
        Some(result)
    }

    /// Apply a state transition. Returns `false`, with a warning, when the
    /// attempt is gone or the transition is illegal.
    pub fn transition<F>(&self, id: Uuid, f: F) -> bool
    where
        F: FnOnce(&mut TransactionAttempt) -> Result<(), TransitionError>,
    {
        match self.update(id, f) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                tracing::warn!(attempt_id = %id, error = %e, "Attempt transition rejected");
                false
            }
            None => {
                tracing::warn!(attempt_id = %id, "Attempt missing from ledger");
                false
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<TransactionAttempt> {
        self.attempts.get(id).map(|r| r.value().clone())
    }

    pub fn by_hash(&self, hash: &TxHash) -> Option<TransactionAttempt> {
        let id = *self.by_hash.get(hash)?.value();
        self.get(&id)
    }

    /// Attempts for `request_id`, oldest first.
    pub fn for_request(&self, request_id: &str) -> Vec<TransactionAttempt> {
        let mut attempts: Vec<_> = self
            .attempts
            .iter()
            .filter(|r| r.value().request_id == request_id)
            .map(|r| r.value().clone())
            .collect();
        attempts.sort_by_key(|a| a.attempt_number);
        attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}
