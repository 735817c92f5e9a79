//! One submission attempt and its state machine.
//!
//! ```text
//! validated ──▶ fee_estimated ──▶ submitted ──▶ confirmed
//!     │              │                │
//!     └──────────────┴────────────────┴──────▶ failed
//! ```
//!
//! `confirmed` and `failed` are terminal. A retry is a new attempt with a new
//! id; attempts are never reused.

use alloy::primitives::TxHash;
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

use crate::blockchain::types::ReceiptSummary;
use crate::fees::{FeeEstimate, FeeParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Validated,
    FeeEstimated,
    Submitted,
    Confirmed,
    Failed,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptStatus::Confirmed | AttemptStatus::Failed)
    }

    pub fn can_transition_to(&self, next: AttemptStatus) -> bool {
        use AttemptStatus::*;
        matches!(
            (self, next),
            (Validated, FeeEstimated)
                | (FeeEstimated, Submitted)
                | (Submitted, Confirmed)
                | (Validated | FeeEstimated | Submitted, Failed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal attempt transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: AttemptStatus,
    pub to: AttemptStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionAttempt {
    pub id: Uuid,
    pub request_id: String,
    /// 1-based position among the request's attempts.
    pub attempt_number: u32,
    pub gas_limit: Option<u64>,
    #[serde(skip)]
    pub fee_params: Option<FeeParams>,
    pub nonce: Option<u64>,
    pub hash: Option<TxHash>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: AttemptStatus,
    pub error: Option<String>,
    /// Last state change; drives ledger retention.
    #[serde(skip)]
    pub updated_at: Instant,
}

impl TransactionAttempt {
    pub fn new(request_id: impl Into<String>, attempt_number: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id: request_id.into(),
            attempt_number,
            gas_limit: None,
            fee_params: None,
            nonce: None,
            hash: None,
            block_number: None,
            gas_used: None,
            status: AttemptStatus::Validated,
            error: None,
            updated_at: Instant::now(),
        }
    }

    fn advance(&mut self, next: AttemptStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Instant::now();
        Ok(())
    }

    pub fn fee_estimated(&mut self, fee: &FeeEstimate) -> Result<(), TransitionError> {
        self.advance(AttemptStatus::FeeEstimated)?;
        self.gas_limit = Some(fee.gas_limit);
        self.fee_params = Some(fee.fee_params);
        Ok(())
    }

    pub fn submitted(&mut self, nonce: u64, hash: TxHash) -> Result<(), TransitionError> {
        self.advance(AttemptStatus::Submitted)?;
        self.nonce = Some(nonce);
        self.hash = Some(hash);
        Ok(())
    }

    /// Record a receipt. A reverted receipt moves the attempt to `failed`.
    pub fn mined(&mut self, receipt: &ReceiptSummary) -> Result<(), TransitionError> {
        let next = if receipt.success {
            AttemptStatus::Confirmed
        } else {
            AttemptStatus::Failed
        };
        self.advance(next)?;
        self.block_number = Some(receipt.block_number);
        self.gas_used = Some(receipt.gas_used);
        if !receipt.success {
            self.error = Some("transaction reverted".to_string());
        }
        Ok(())
    }

    pub fn failed(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.advance(AttemptStatus::Failed)?;
        self.error = Some(reason.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fee() -> FeeEstimate {
        FeeEstimate {
            gas_limit: 120_000,
            fee_params: FeeParams::Legacy { gas_price: 1 },
            estimated: true,
        }
    }

    fn receipt(success: bool) -> ReceiptSummary {
        ReceiptSummary {
            tx_hash: TxHash::repeat_byte(0x01),
            block_number: 42,
            gas_used: 90_000,
            success,
        }
    }

    #[test]
    fn test_happy_path() {
        let mut attempt = TransactionAttempt::new("req-1", 1);
        attempt.fee_estimated(&fee()).unwrap();
        attempt.submitted(7, TxHash::repeat_byte(0x01)).unwrap();
        attempt.mined(&receipt(true)).unwrap();
        assert_eq!(attempt.status, AttemptStatus::Confirmed);
        assert_eq!(attempt.block_number, Some(42));
        assert!(attempt.status.is_terminal());
    }

    #[test]
    fn test_revert_fails_attempt() {
        let mut attempt = TransactionAttempt::new("req-1", 1);
        attempt.fee_estimated(&fee()).unwrap();
        attempt.submitted(7, TxHash::repeat_byte(0x01)).unwrap();
        attempt.mined(&receipt(false)).unwrap();
        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert_eq!(attempt.gas_used, Some(90_000));
    }

    #[test]
    fn test_illegal_transitions() {
        let mut attempt = TransactionAttempt::new("req-1", 1);
        assert!(attempt.submitted(0, TxHash::ZERO).is_err());
        assert!(attempt.mined(&receipt(true)).is_err());

        attempt.failed("rpc down").unwrap();
        assert!(attempt.fee_estimated(&fee()).is_err());
        assert!(attempt.failed("again").is_err());
    }

    #[test]
    fn test_attempt_ids_unique() {
        let a = TransactionAttempt::new("req-1", 1);
        let b = TransactionAttempt::new("req-1", 2);
        assert_ne!(a.id, b.id);
    }
}
