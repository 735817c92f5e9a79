//! The seam between the relay core and a chain.
//!
//! Everything the engine needs from a node goes through [`ChainBackend`].
//! [`BlockchainClient`](crate::blockchain::BlockchainClient) implements it over
//! JSON-RPC; tests implement it in memory.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use crate::blockchain::types::{BlockchainResult, Eip1559Fees, ReceiptSummary, SignedTransaction};

/// Read and broadcast operations against one chain.
///
/// Implementations must bound every call in time and return
/// [`BlockchainError::Timeout`](crate::blockchain::BlockchainError::Timeout)
/// rather than hang.
#[async_trait]
pub trait ChainBackend: Send + Sync {
    async fn chain_id(&self) -> BlockchainResult<u64>;

    /// Latest block height.
    async fn block_number(&self) -> BlockchainResult<u64>;

    /// Timestamp of a block, `None` if the node doesn't know it.
    async fn block_timestamp(&self, block_number: u64) -> BlockchainResult<Option<u64>>;

    /// Native balance in wei.
    async fn balance(&self, address: Address) -> BlockchainResult<U256>;

    /// Transaction count including pending transactions.
    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64>;

    /// Legacy gas price in wei.
    async fn gas_price(&self) -> BlockchainResult<u128>;

    async fn eip1559_fees(&self) -> BlockchainResult<Eip1559Fees>;

    /// Simulate `tx` against pending state and return its gas usage.
    async fn estimate_gas(&self, tx: &TransactionRequest) -> BlockchainResult<u64>;

    /// Read-only `eth_call`.
    async fn call(&self, tx: &TransactionRequest) -> BlockchainResult<Bytes>;

    /// Broadcast a signed transaction. Errors are classified via
    /// [`BlockchainError::from_send_error`](crate::blockchain::BlockchainError::from_send_error).
    async fn send_raw_transaction(&self, tx: &SignedTransaction) -> BlockchainResult<TxHash>;

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>>;
}
