//! Relay engine: the entry point callers use.

pub mod error;
pub mod relay;

pub use error::{ErrorBody, ErrorCategory, RelayError};
pub use relay::{
    PaymentConfig, PaymentReceipt, PaymentResponse, RelayEngine, RewardQuote, TokenBalance,
};
