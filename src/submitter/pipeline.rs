//! Drives a validated call through fee estimation, serialized broadcast and
//! receipt polling.
//!
//! The relayer lease is held from the balance check until the broadcast
//! returns, and no longer. Receipt polling runs without it.
//!
//! A broadcast that times out may still have reached the node. Its locally
//! computed hash is tracked like any submitted transaction, and the attempt
//! is never retried under a new nonce.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::blockchain::backend::ChainBackend;
use crate::blockchain::types::{BlockchainError, ReceiptSummary};
use crate::config::BlockchainConfig;
use crate::engine::error::RelayError;
use crate::fees::FeeEstimator;
use crate::observability::metrics;
use crate::relayer::RelayerIdentity;
use crate::resilience::backoff::RetryPolicy;
use crate::submitter::attempt::TransactionAttempt;
use crate::submitter::ledger::AttemptLedger;

/// A confirmed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub attempt_id: Uuid,
    pub tx_hash: TxHash,
    pub nonce: u64,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Why an attempt ended, and whether a fresh attempt may follow.
#[derive(Debug)]
struct AttemptFailure {
    error: RelayError,
    retry: bool,
}

impl AttemptFailure {
    fn terminal(error: RelayError) -> Self {
        Self { error, retry: false }
    }

    fn retryable(error: RelayError) -> Self {
        Self { error, retry: true }
    }
}

/// Receipt polling settings.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub confirmation_blocks: u32,
}

impl From<&BlockchainConfig> for ReceiptPolicy {
    fn from(config: &BlockchainConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
            timeout: Duration::from_secs(config.receipt_timeout_secs),
            confirmation_blocks: config.confirmation_blocks.max(1),
        }
    }
}

#[derive(Clone)]
pub struct TransactionSubmitter {
    backend: Arc<dyn ChainBackend>,
    identity: RelayerIdentity,
    fees: FeeEstimator,
    ledger: AttemptLedger,
    retry: RetryPolicy,
    receipts: ReceiptPolicy,
}

impl TransactionSubmitter {
    pub fn new(
        backend: Arc<dyn ChainBackend>,
        identity: RelayerIdentity,
        fees: FeeEstimator,
        ledger: AttemptLedger,
        retry: RetryPolicy,
        receipts: ReceiptPolicy,
    ) -> Self {
        Self {
            backend,
            identity,
            fees,
            ledger,
            retry,
            receipts,
        }
    }

    pub fn ledger(&self) -> &AttemptLedger {
        &self.ledger
    }

    pub fn identity(&self) -> &RelayerIdentity {
        &self.identity
    }

    /// Submit `calldata` to `to` from the relayer and wait for its receipt.
    ///
    /// Nonce conflicts and pre-broadcast RPC failures start a fresh attempt
    /// after backoff, up to the configured attempt count.
    pub async fn submit(
        &self,
        request_id: &str,
        to: Address,
        calldata: Bytes,
    ) -> Result<SubmissionOutcome, RelayError> {
        let mut attempt_number = 0;
        loop {
            attempt_number += 1;
            match self.run_attempt(request_id, attempt_number, to, calldata.clone()).await {
                Ok(outcome) => return Ok(outcome),
                Err(failure) if failure.retry && self.retry.allows_retry_after(attempt_number) => {
                    let delay = self.retry.delay_for(attempt_number);
                    tracing::warn!(
                        request_id,
                        attempt = attempt_number,
                        error = %failure.error,
                        delay_ms = delay.as_millis() as u64,
                        "Submission attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => {
                    tracing::error!(
                        request_id,
                        attempt = attempt_number,
                        error = %failure.error,
                        "Submission failed"
                    );
                    return Err(failure.error);
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        request_id: &str,
        attempt_number: u32,
        to: Address,
        calldata: Bytes,
    ) -> Result<SubmissionOutcome, AttemptFailure> {
        let attempt = TransactionAttempt::new(request_id, attempt_number);
        let attempt_id = attempt.id;
        self.ledger.insert(attempt);

        let result = self.drive(attempt_id, to, calldata).await;
        if let Err(failure) = &result {
            // Attempts left `submitted` after a receipt timeout stay open.
            if !matches!(failure.error, RelayError::ConfirmationTimeout { .. }) {
                let reason = failure.error.to_string();
                let open = self
                    .ledger
                    .get(&attempt_id)
                    .is_some_and(|a| !a.status.is_terminal());
                if open {
                    self.ledger.transition(attempt_id, |a| a.failed(reason));
                }
            }
        }
        result
    }

    async fn drive(
        &self,
        attempt_id: Uuid,
        to: Address,
        calldata: Bytes,
    ) -> Result<SubmissionOutcome, AttemptFailure> {
        let tx = TransactionRequest::default()
            .with_from(self.identity.address())
            .with_to(to)
            .with_value(U256::ZERO)
            .with_input(calldata);

        // validated → fee_estimated
        let fee = self.fees.estimate_fee(&tx).await.map_err(|e| match e {
            BlockchainError::GasPriceTooHigh { .. } => AttemptFailure::terminal(RelayError::Chain(e)),
            other => AttemptFailure::retryable(RelayError::from(other)),
        })?;
        self.ledger.transition(attempt_id, |a| a.fee_estimated(&fee));

        // fee_estimated → submitted, under the lease
        let mut lease = self.identity.acquire().await;

        let balance = lease
            .balance()
            .await
            .map_err(|e| AttemptFailure::retryable(RelayError::from(e)))?;
        metrics::record_relayer_balance(balance);
        if !self.identity.has_sufficient_balance(balance) {
            tracing::error!(
                relayer = %lease.address(),
                balance = %balance,
                required = %self.identity.min_balance_threshold(),
                "Relayer balance below minimum"
            );
            return Err(AttemptFailure::terminal(RelayError::InsufficientRelayerBalance {
                balance,
                required: self.identity.min_balance_threshold(),
            }));
        }

        let nonce = lease
            .next_nonce()
            .await
            .map_err(|e| AttemptFailure::retryable(RelayError::from(e)))?;
        let signed = lease
            .sign(fee.apply(tx.with_nonce(nonce)))
            .await
            .map_err(|e| AttemptFailure::terminal(RelayError::from(e)))?;

        let tx_hash = match self.backend.send_raw_transaction(&signed).await {
            Ok(hash) => {
                lease.commit(nonce);
                metrics::record_submission("broadcast");
                hash
            }
            Err(BlockchainError::Timeout(secs)) => {
                // Re-sync the nonce: the node's pending count shows whether
                // it kept the transaction.
                lease.reset();
                metrics::record_submission("broadcast_unknown");
                tracing::warn!(
                    nonce,
                    tx_hash = %signed.hash,
                    timeout_secs = secs,
                    "Broadcast timed out, tracking transaction by local hash"
                );
                signed.hash
            }
            Err(e) => {
                lease.reset();
                metrics::record_submission("rejected");
                return Err(match e {
                    BlockchainError::NonceConflict(_) => {
                        metrics::record_nonce_conflict();
                        tracing::warn!(nonce, error = %e, "Nonce conflict on broadcast");
                        AttemptFailure::retryable(RelayError::from(e))
                    }
                    other => AttemptFailure::terminal(RelayError::from(other)),
                });
            }
        };
        drop(lease);

        self.ledger.transition(attempt_id, |a| a.submitted(nonce, tx_hash));
        tracing::info!(
            attempt_id = %attempt_id,
            tx_hash = %tx_hash,
            nonce,
            gas_limit = fee.gas_limit,
            "Transaction broadcast"
        );

        // submitted → confirmed | failed
        let started = Instant::now();
        let receipt = self.wait_for_receipt(tx_hash).await?;
        metrics::record_confirmation(started.elapsed());
        self.ledger.transition(attempt_id, |a| a.mined(&receipt));

        if !receipt.success {
            metrics::record_submission("reverted");
            return Err(AttemptFailure::terminal(RelayError::Reverted {
                tx_hash: Some(tx_hash),
                reason: format!("receipt status 0 in block {}", receipt.block_number),
            }));
        }

        metrics::record_submission("confirmed");
        tracing::info!(
            tx_hash = %tx_hash,
            block_number = receipt.block_number,
            gas_used = receipt.gas_used,
            "Transaction confirmed"
        );

        Ok(SubmissionOutcome {
            attempt_id,
            tx_hash,
            nonce,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        })
    }

    /// Poll until the receipt exists and has enough confirmations, or the
    /// receipt timeout elapses. RPC errors while polling are logged and
    /// polled through.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<ReceiptSummary, AttemptFailure> {
        let deadline = Instant::now() + self.receipts.timeout;
        loop {
            match self.backend.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) if self.has_confirmations(&receipt).await => return Ok(receipt),
                Ok(_) => {}
                Err(e) => tracing::debug!(tx_hash = %tx_hash, error = %e, "Receipt poll failed"),
            }

            if Instant::now() + self.receipts.poll_interval > deadline {
                metrics::record_submission("timeout");
                return Err(AttemptFailure::terminal(RelayError::ConfirmationTimeout {
                    tx_hash,
                    secs: self.receipts.timeout.as_secs(),
                }));
            }
            tokio::time::sleep(self.receipts.poll_interval).await;
        }
    }

    async fn has_confirmations(&self, receipt: &ReceiptSummary) -> bool {
        if self.receipts.confirmation_blocks <= 1 {
            return true;
        }
        match self.backend.block_number().await {
            Ok(height) => {
                height.saturating_sub(receipt.block_number) + 1
                    >= u64::from(self.receipts.confirmation_blocks)
            }
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for TransactionSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSubmitter")
            .field("identity", &self.identity)
            .field("retry", &self.retry)
            .field("receipts", &self.receipts)
            .finish()
    }
}
