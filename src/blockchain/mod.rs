//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment variable (relayer private key)
//!     → wallet.rs (key loading, raw transaction signing)
//! RPC URLs
//!     → client.rs (JSON-RPC with timeouts and failover)
//!     → backend.rs (ChainBackend trait the core depends on)
//!     → token.rs (typed token reads over ChainBackend::call)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod abi;
pub mod backend;
pub mod client;
pub mod token;
pub mod types;
pub mod wallet;

pub use backend::ChainBackend;
pub use client::BlockchainClient;
pub use token::TokenReader;
pub use types::{
    BlockchainConfig, BlockchainError, BlockchainResult, Eip1559Fees, ReceiptSummary,
    SignedTransaction,
};
pub use wallet::Wallet;
