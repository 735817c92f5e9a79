//! Chain-specific types and error definitions.

use alloy::primitives::{Address, Bytes, TxHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::config::schema::BlockchainConfig;

/// Errors that can occur during blockchain operations.
#[derive(Debug, Clone, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Transaction was reverted on-chain.
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// Invalid private key format or signing error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Node rejected the transaction nonce (too low, too high, replaced).
    #[error("Nonce conflict: {0}")]
    NonceConflict(String),

    /// Sender cannot pay for gas.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Return data could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

impl BlockchainError {
    /// Classify a node's rejection message for a broadcast.
    pub fn from_send_error(message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("nonce too low")
            || lower.contains("nonce too high")
            || lower.contains("already known")
            || lower.contains("replacement transaction underpriced")
            || lower.contains("nonce expired")
        {
            Self::NonceConflict(message)
        } else if lower.contains("insufficient funds") {
            Self::InsufficientFunds(message)
        } else if lower.contains("execution reverted") {
            Self::Reverted(message)
        } else {
            Self::Rpc(message)
        }
    }
}

/// A signed, encoded transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    /// EIP-2718 encoded envelope.
    pub raw: Bytes,
    pub hash: TxHash,
    pub nonce: u64,
    pub to: Option<Address>,
    pub input: Bytes,
    pub gas_limit: u64,
}

/// The parts of a receipt the relay cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    /// Receipt status code was 1.
    pub success: bool,
}

/// EIP-1559 fee pair in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eip1559Fees {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}
