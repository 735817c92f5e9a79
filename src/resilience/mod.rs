//! Resilience helpers.
//!
//! RPC timeouts and provider failover live in
//! [`BlockchainClient`](crate::blockchain::BlockchainClient); this module only
//! spaces out transaction submission retries.

pub mod backoff;

pub use backoff::{calculate_backoff, RetryPolicy};
