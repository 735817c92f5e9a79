//! Lazy confirmation-state lookup for broadcast transactions.
//!
//! Nothing runs in the background: every call reads the receipt and chain
//! height afresh, so callers may poll as often as they like.

use alloy::primitives::TxHash;
use serde::Serialize;
use std::sync::Arc;

use crate::blockchain::backend::ChainBackend;
use crate::blockchain::types::BlockchainResult;
use crate::submitter::AttemptLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxState {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxStatusReport {
    pub tx_hash: TxHash,
    pub status: TxState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    /// Originating request, when this process broadcast the transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Clone)]
pub struct StatusTracker {
    backend: Arc<dyn ChainBackend>,
    ledger: AttemptLedger,
}

impl StatusTracker {
    pub fn new(backend: Arc<dyn ChainBackend>, ledger: AttemptLedger) -> Self {
        Self { backend, ledger }
    }

    pub async fn status(&self, tx_hash: TxHash) -> BlockchainResult<TxStatusReport> {
        let request_id = self.ledger.by_hash(&tx_hash).map(|a| a.request_id);

        let Some(receipt) = self.backend.transaction_receipt(tx_hash).await? else {
            return Ok(TxStatusReport {
                tx_hash,
                status: TxState::Pending,
                block_number: None,
                confirmations: None,
                timestamp: None,
                gas_used: None,
                request_id,
            });
        };

        let (height, timestamp) = tokio::join!(
            self.backend.block_number(),
            self.backend.block_timestamp(receipt.block_number)
        );
        let confirmations = height?.saturating_sub(receipt.block_number);
        // A missing block header only costs the timestamp.
        let timestamp = timestamp.unwrap_or_else(|e| {
            tracing::debug!(block = receipt.block_number, error = %e, "Block timestamp unavailable");
            None
        });

        Ok(TxStatusReport {
            tx_hash,
            status: if receipt.success {
                TxState::Confirmed
            } else {
                TxState::Failed
            },
            block_number: Some(receipt.block_number),
            confirmations: Some(confirmations),
            timestamp,
            gas_used: Some(receipt.gas_used),
            request_id,
        })
    }
}

impl std::fmt::Debug for StatusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusTracker").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_report_json() {
        let report = TxStatusReport {
            tx_hash: TxHash::repeat_byte(0x11),
            status: TxState::Pending,
            block_number: None,
            confirmations: None,
            timestamp: None,
            gas_used: None,
            request_id: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("blockNumber").is_none());
        assert!(json["txHash"].as_str().unwrap().starts_with("0x1111"));
    }
}
