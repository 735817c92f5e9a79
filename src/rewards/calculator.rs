//! Deterministic payment → reward mapping.
//!
//! The payment amount arrives in the payment token's smallest unit. It is
//! scaled down to a canonical human decimal ("1", "2.5") and looked up in the
//! ordered rate table. Misses fall back to `amount * base_rate`, computed in
//! integer arithmetic so the same input always yields the same reward.

use alloy::primitives::utils::{format_units, parse_units, ParseUnits};
use alloy::primitives::U256;
use thiserror::Error;

use crate::config::schema::{RateEntry, RewardConfig};

/// Errors from reward calculation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewardError {
    #[error("invalid decimal '{0}'")]
    InvalidDecimal(String),

    #[error("unsupported decimals {0}")]
    UnsupportedDecimals(u8),

    #[error("reward computation overflowed")]
    Overflow,
}

/// Parse a non-negative decimal string into smallest units.
pub fn parse_decimal(value: &str, decimals: u8) -> Option<U256> {
    canonical_decimal(value)?;
    match parse_units(value.trim(), decimals).ok()? {
        ParseUnits::U256(v) => Some(v),
        ParseUnits::I256(_) => None,
    }
}

/// Normalize a non-negative decimal string: no leading zeros on the integer
/// part, no trailing zeros on the fraction, no dangling point.
///
/// Returns `None` for anything that isn't `digits[.digits]`.
pub fn canonical_decimal(value: &str) -> Option<String> {
    let value = value.trim();
    let (int_part, frac_part) = match value.split_once('.') {
        Some((i, f)) => (i, f),
        None => (value, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let int_part = int_part.trim_start_matches('0');
    let frac_part = frac_part.trim_end_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };

    if frac_part.is_empty() {
        Some(int_part.to_string())
    } else {
        Some(format!("{}.{}", int_part, frac_part))
    }
}

/// Ordered rate table plus the proportional fallback.
#[derive(Debug, Clone)]
pub struct RewardCalculator {
    /// (canonical amount, reward in smallest units), in preference order.
    table: Vec<(String, U256)>,
    entries: Vec<RateEntry>,
    base_rate: U256,
    reward_decimals: u8,
}

impl RewardCalculator {
    /// Build a calculator from configuration.
    pub fn new(config: &RewardConfig) -> Result<Self, RewardError> {
        let reward_decimals = config.reward_decimals;
        let mut table = Vec::with_capacity(config.rates.len());
        for entry in &config.rates {
            let key = canonical_decimal(&entry.amount)
                .ok_or_else(|| RewardError::InvalidDecimal(entry.amount.clone()))?;
            let reward = parse_decimal(&entry.reward, reward_decimals)
                .ok_or_else(|| RewardError::InvalidDecimal(entry.reward.clone()))?;
            table.push((key, reward));
        }
        let base_rate = parse_decimal(&config.base_rate, reward_decimals)
            .ok_or_else(|| RewardError::InvalidDecimal(config.base_rate.clone()))?;

        Ok(Self {
            table,
            entries: config.rates.clone(),
            base_rate,
            reward_decimals,
        })
    }

    /// Compute the reward (reward-token smallest units) for a payment given in
    /// payment-token smallest units.
    pub fn calculate_reward(
        &self,
        payment_amount: U256,
        payment_decimals: u8,
    ) -> Result<U256, RewardError> {
        if payment_decimals > 77 {
            return Err(RewardError::UnsupportedDecimals(payment_decimals));
        }

        let human = format_units(payment_amount, payment_decimals)
            .map_err(|_| RewardError::UnsupportedDecimals(payment_decimals))?;
        let key = canonical_decimal(&human).ok_or(RewardError::InvalidDecimal(human))?;

        if let Some((_, reward)) = self.table.iter().find(|(amount, _)| *amount == key) {
            return Ok(*reward);
        }

        let scale = U256::from(10u64).pow(U256::from(payment_decimals));
        payment_amount
            .checked_mul(self.base_rate)
            .map(|v| v / scale)
            .ok_or(RewardError::Overflow)
    }

    /// Configured rate table in preference order.
    pub fn rates(&self) -> &[RateEntry] {
        &self.entries
    }

    pub fn reward_decimals(&self) -> u8 {
        self.reward_decimals
    }
}
