//! Relay error taxonomy.
//!
//! | Category       | Examples                                   | Retry |
//! |----------------|--------------------------------------------|-------|
//! | `input`        | bad address, expired permit, wrong token   | no    |
//! | `verification` | signer mismatch, nonce mismatch            | no    |
//! | `resource`     | relayer balance below threshold            | no    |
//! | `transient`    | RPC timeout, fee spike, receipt timeout    | mostly|
//! | `on_chain`     | revert, nonce conflict                     | conflict only |

use alloy::primitives::{Address, TxHash, U256};
use serde::Serialize;
use thiserror::Error;

use crate::blockchain::types::BlockchainError;
use crate::permit::verifier::PermitError;
use crate::rewards::calculator::RewardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Input,
    Verification,
    Resource,
    Transient,
    OnChain,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Input => "input",
            ErrorCategory::Verification => "verification",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Transient => "transient",
            ErrorCategory::OnChain => "on_chain",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a relay request can fail with.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error("invalid {field}: '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("invalid transaction hash: '{0}'")]
    InvalidTxHash(String),

    #[error("invalid {field}: '{value}' (expected a positive integer)")]
    InvalidAmount { field: &'static str, value: String },

    #[error("permit expired (deadline {deadline}, now {now})")]
    ExpiredSignature { deadline: u64, now: u64 },

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("unsupported payment token {0}")]
    UnsupportedToken(Address),

    #[error("insufficient token balance: need {required}, have {available}")]
    InsufficientTokenBalance { required: U256, available: U256 },

    #[error("reward mismatch: expected {expected}, got {provided}")]
    RewardMismatch { expected: U256, provided: U256 },

    #[error("reward calculation failed: {0}")]
    Reward(#[from] RewardError),

    #[error("signature recovers to {recovered}, not {expected}")]
    SignerMismatch { expected: Address, recovered: Address },

    #[error("permit nonce mismatch: expected {expected}, got {provided}")]
    NonceMismatch { expected: U256, provided: U256 },

    #[error("relayer balance {balance} wei below minimum {required} wei")]
    InsufficientRelayerBalance { balance: U256, required: U256 },

    #[error("relayer cannot pay for gas: {0}")]
    InsufficientGasFunds(String),

    #[error("chain unavailable: {0}")]
    Chain(BlockchainError),

    #[error("transaction {tx_hash} not confirmed within {secs}s")]
    ConfirmationTimeout { tx_hash: TxHash, secs: u64 },

    #[error("transaction reverted: {reason}")]
    Reverted { tx_hash: Option<TxHash>, reason: String },

    #[error("nonce conflict: {0}")]
    NonceConflict(String),
}

impl RelayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::InvalidAddress { .. }
            | RelayError::InvalidTxHash(_)
            | RelayError::InvalidAmount { .. }
            | RelayError::ExpiredSignature { .. }
            | RelayError::MalformedSignature(_)
            | RelayError::UnsupportedToken(_)
            | RelayError::InsufficientTokenBalance { .. }
            | RelayError::RewardMismatch { .. }
            | RelayError::Reward(_) => ErrorCategory::Input,
            RelayError::SignerMismatch { .. } | RelayError::NonceMismatch { .. } => {
                ErrorCategory::Verification
            }
            RelayError::InsufficientRelayerBalance { .. } | RelayError::InsufficientGasFunds(_) => {
                ErrorCategory::Resource
            }
            RelayError::Chain(_) | RelayError::ConfirmationTimeout { .. } => ErrorCategory::Transient,
            RelayError::Reverted { .. } | RelayError::NonceConflict(_) => ErrorCategory::OnChain,
        }
    }

    /// Whether the caller may resubmit the same request.
    ///
    /// A confirmation timeout is not retryable: the transaction may still be
    /// mined, so the caller polls its status instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::NonceConflict(_) => true,
            RelayError::Chain(e) => !matches!(
                e,
                BlockchainError::Decode(_)
                    | BlockchainError::Wallet(_)
                    | BlockchainError::ChainMismatch { .. }
            ),
            _ => false,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::InvalidAddress { .. } => "INVALID_ADDRESS",
            RelayError::InvalidTxHash(_) => "INVALID_TX_HASH",
            RelayError::InvalidAmount { .. } => "INVALID_AMOUNT",
            RelayError::ExpiredSignature { .. } => "EXPIRED_SIGNATURE",
            RelayError::MalformedSignature(_) => "MALFORMED_SIGNATURE",
            RelayError::UnsupportedToken(_) => "UNSUPPORTED_TOKEN",
            RelayError::InsufficientTokenBalance { .. } => "INSUFFICIENT_TOKEN_BALANCE",
            RelayError::RewardMismatch { .. } => "REWARD_MISMATCH",
            RelayError::Reward(_) => "REWARD_CALCULATION",
            RelayError::SignerMismatch { .. } => "SIGNER_MISMATCH",
            RelayError::NonceMismatch { .. } => "NONCE_MISMATCH",
            RelayError::InsufficientRelayerBalance { .. } => "INSUFFICIENT_RELAYER_BALANCE",
            RelayError::InsufficientGasFunds(_) => "INSUFFICIENT_GAS_FUNDS",
            RelayError::Chain(BlockchainError::Timeout(_)) => "RPC_TIMEOUT",
            RelayError::Chain(BlockchainError::GasPriceTooHigh { .. }) => "GAS_PRICE_TOO_HIGH",
            RelayError::Chain(_) => "CHAIN_UNAVAILABLE",
            RelayError::ConfirmationTimeout { .. } => "CONFIRMATION_TIMEOUT",
            RelayError::Reverted { .. } => "TRANSACTION_REVERTED",
            RelayError::NonceConflict(_) => "NONCE_CONFLICT",
        }
    }
}

impl From<BlockchainError> for RelayError {
    fn from(e: BlockchainError) -> Self {
        match e {
            BlockchainError::NonceConflict(msg) => RelayError::NonceConflict(msg),
            BlockchainError::InsufficientFunds(msg) => RelayError::InsufficientGasFunds(msg),
            BlockchainError::Reverted(reason) => RelayError::Reverted { tx_hash: None, reason },
            other => RelayError::Chain(other),
        }
    }
}

impl From<PermitError> for RelayError {
    fn from(e: PermitError) -> Self {
        match e {
            PermitError::ExpiredSignature { deadline, now } => {
                RelayError::ExpiredSignature { deadline, now }
            }
            PermitError::SignerMismatch { expected, recovered } => {
                RelayError::SignerMismatch { expected, recovered }
            }
            PermitError::MalformedSignature(msg) => RelayError::MalformedSignature(msg),
            PermitError::UnsupportedToken(token) => RelayError::UnsupportedToken(token),
            PermitError::NonceMismatch { expected, provided } => {
                RelayError::NonceMismatch { expected, provided }
            }
            PermitError::Chain(e) => RelayError::Chain(e),
        }
    }
}

/// Error as reported to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub category: ErrorCategory,
    pub retryable: bool,
}

impl From<&RelayError> for ErrorBody {
    fn from(e: &RelayError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            category: e.category(),
            retryable: e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_conflict_retryable_revert_terminal() {
        let conflict = RelayError::from(BlockchainError::NonceConflict("nonce too low".into()));
        assert_eq!(conflict.category(), ErrorCategory::OnChain);
        assert!(conflict.is_retryable());

        let revert = RelayError::from(BlockchainError::Reverted("execution reverted".into()));
        assert_eq!(revert.category(), ErrorCategory::OnChain);
        assert!(!revert.is_retryable());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            RelayError::from(PermitError::ExpiredSignature { deadline: 1, now: 2 }).category(),
            ErrorCategory::Input
        );
        assert_eq!(
            RelayError::NonceMismatch {
                expected: U256::from(1),
                provided: U256::ZERO
            }
            .category(),
            ErrorCategory::Verification
        );
        assert_eq!(
            RelayError::InsufficientRelayerBalance {
                balance: U256::ZERO,
                required: U256::from(1)
            }
            .category(),
            ErrorCategory::Resource
        );
        let timeout = RelayError::from(BlockchainError::Timeout(10));
        assert_eq!(timeout.category(), ErrorCategory::Transient);
        assert!(timeout.is_retryable());
        assert_eq!(timeout.code(), "RPC_TIMEOUT");
    }

    #[test]
    fn test_error_body() {
        let err = RelayError::UnsupportedToken(Address::repeat_byte(0x11));
        let body = ErrorBody::from(&err);
        assert_eq!(body.code, "UNSUPPORTED_TOKEN");
        assert!(!body.retryable);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["category"], "input");
    }
}
