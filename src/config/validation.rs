//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate address formats and value ranges
//! - Validate the rate table (positive decimal keys and values)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::{Address, U256};
use std::collections::HashSet;

use crate::config::schema::RelayConfig;
use crate::rewards::calculator::{canonical_decimal, parse_decimal};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (field, value) in [
        ("contracts.facilitator", &config.contracts.facilitator),
        ("contracts.payment_token", &config.contracts.payment_token),
        ("contracts.reward_token", &config.contracts.reward_token),
    ] {
        if value.parse::<Address>().is_err() {
            errors.push(ValidationError::new(field, format!("invalid address '{}'", value)));
        }
    }

    if config.blockchain.rpc_url.parse::<url::Url>().is_err() {
        errors.push(ValidationError::new("blockchain.rpc_url", "invalid URL"));
    }
    if config.blockchain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be > 0"));
    }
    if config.blockchain.receipt_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.receipt_timeout_secs", "must be > 0"));
    }
    if config.blockchain.receipt_poll_interval_ms == 0 {
        errors.push(ValidationError::new("blockchain.receipt_poll_interval_ms", "must be > 0"));
    }

    if config.relayer.min_balance_wei.parse::<U256>().is_err() {
        errors.push(ValidationError::new(
            "relayer.min_balance_wei",
            "must be a base-10 integer",
        ));
    }
    if config.relayer.max_submission_attempts == 0 || config.relayer.max_submission_attempts > 3 {
        errors.push(ValidationError::new(
            "relayer.max_submission_attempts",
            "must be between 1 and 3",
        ));
    }
    if config.relayer.ledger_retention_secs <= config.blockchain.receipt_timeout_secs {
        errors.push(ValidationError::new(
            "relayer.ledger_retention_secs",
            "must exceed blockchain.receipt_timeout_secs",
        ));
    }
    if config.relayer.ledger_max_entries == 0 {
        errors.push(ValidationError::new("relayer.ledger_max_entries", "must be > 0"));
    }
    if config.relayer.private_key_env.is_empty() {
        errors.push(ValidationError::new("relayer.private_key_env", "must not be empty"));
    }

    if !(config.fees.gas_limit_multiplier >= 1.0 && config.fees.gas_limit_multiplier <= 5.0) {
        errors.push(ValidationError::new(
            "fees.gas_limit_multiplier",
            "must be between 1.0 and 5.0",
        ));
    }
    if config.fees.default_gas_limit < 21_000 {
        errors.push(ValidationError::new("fees.default_gas_limit", "must be >= 21000"));
    }

    let rewards = &config.rewards;
    if rewards.reward_decimals > 77 || rewards.payment_decimals > 77 {
        errors.push(ValidationError::new("rewards", "decimals must be <= 77"));
    }
    if !is_positive_decimal(&rewards.base_rate, rewards.reward_decimals) {
        errors.push(ValidationError::new("rewards.base_rate", "must be a positive decimal"));
    }
    let mut seen = HashSet::new();
    for (i, entry) in rewards.rates.iter().enumerate() {
        let field = format!("rewards.rates[{}]", i);
        match canonical_decimal(&entry.amount) {
            Some(key) => {
                if !seen.insert(key) {
                    errors.push(ValidationError::new(&field, "duplicate amount"));
                }
            }
            None => errors.push(ValidationError::new(&field, "amount must be a decimal")),
        }
        if !is_positive_decimal(&entry.reward, rewards.reward_decimals) {
            errors.push(ValidationError::new(&field, "reward must be a positive decimal"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_positive_decimal(value: &str, decimals: u8) -> bool {
    matches!(parse_decimal(value, decimals), Some(v) if !v.is_zero())
}
