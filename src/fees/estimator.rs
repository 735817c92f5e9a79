//! Gas limit and fee price selection for one submission attempt.
//!
//! Gas limit: live `estimate_gas` scaled by the configured multiplier, or the
//! configured default when estimation fails for any reason. A failed
//! estimate never fails the request; the broadcast or receipt will surface a
//! genuine revert.
//!
//! Fee price: read fresh on every call, never cached.

use alloy::network::TransactionBuilder;
use alloy::rpc::types::TransactionRequest;
use std::sync::Arc;

use crate::blockchain::backend::ChainBackend;
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::config::FeeConfig;
use crate::observability::metrics;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Price side of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeParams {
    Legacy {
        gas_price: u128,
    },
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl FeeParams {
    /// Highest price per gas this attempt may pay.
    pub fn max_price_per_gas(&self) -> u128 {
        match self {
            FeeParams::Legacy { gas_price } => *gas_price,
            FeeParams::Eip1559 { max_fee_per_gas, .. } => *max_fee_per_gas,
        }
    }

    pub fn apply(&self, tx: TransactionRequest) -> TransactionRequest {
        match *self {
            FeeParams::Legacy { gas_price } => tx.with_gas_price(gas_price),
            FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => tx
                .with_max_fee_per_gas(max_fee_per_gas)
                .with_max_priority_fee_per_gas(max_priority_fee_per_gas),
        }
    }
}

/// Gas parameters for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub gas_limit: u64,
    pub fee_params: FeeParams,
    /// `false` when `gas_limit` is the configured fallback.
    pub estimated: bool,
}

impl FeeEstimate {
    pub fn apply(&self, tx: TransactionRequest) -> TransactionRequest {
        self.fee_params.apply(tx.with_gas_limit(self.gas_limit))
    }
}

/// Apply a percentage buffer: `gas * round(multiplier * 100) / 100`.
pub fn buffered_gas_limit(estimate: u64, multiplier: f64) -> u64 {
    let percent = (multiplier * 100.0).round().max(100.0) as u128;
    let buffered = u128::from(estimate) * percent / 100;
    u64::try_from(buffered).unwrap_or(u64::MAX)
}

#[derive(Clone)]
pub struct FeeEstimator {
    backend: Arc<dyn ChainBackend>,
    config: FeeConfig,
}

impl FeeEstimator {
    pub fn new(backend: Arc<dyn ChainBackend>, config: FeeConfig) -> Self {
        Self { backend, config }
    }

    /// Gas limit and fee price for `tx`.
    ///
    /// Only the price lookup and the price cap can fail; gas estimation
    /// failures fall back to the default limit.
    pub async fn estimate_fee(&self, tx: &TransactionRequest) -> BlockchainResult<FeeEstimate> {
        let (gas_limit, estimated) = match self.backend.estimate_gas(tx).await {
            Ok(gas) => {
                let limit = buffered_gas_limit(gas, self.config.gas_limit_multiplier);
                tracing::debug!(estimated_gas = gas, gas_limit = limit, "Gas estimated");
                (limit, true)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    default_gas_limit = self.config.default_gas_limit,
                    "Gas estimation failed, using default"
                );
                metrics::record_fee_fallback();
                (self.config.default_gas_limit, false)
            }
        };

        let fee_params = self.current_fee_params().await?;
        self.check_price_cap(&fee_params)?;

        Ok(FeeEstimate {
            gas_limit,
            fee_params,
            estimated,
        })
    }

    /// Live fee price in the configured mode.
    pub async fn current_fee_params(&self) -> BlockchainResult<FeeParams> {
        if self.config.eip1559 {
            let fees = self.backend.eip1559_fees().await?;
            Ok(FeeParams::Eip1559 {
                max_fee_per_gas: fees.max_fee_per_gas,
                max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            })
        } else {
            let gas_price = self.backend.gas_price().await?;
            Ok(FeeParams::Legacy { gas_price })
        }
    }

    fn check_price_cap(&self, params: &FeeParams) -> BlockchainResult<()> {
        let max_wei = u128::from(self.config.max_gas_price_gwei) * WEI_PER_GWEI;
        let price = params.max_price_per_gas();
        if price > max_wei {
            return Err(BlockchainError::GasPriceTooHigh {
                current_gwei: u64::try_from(price / WEI_PER_GWEI).unwrap_or(u64::MAX),
                max_gwei: self.config.max_gas_price_gwei,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for FeeEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeeEstimator").field("config", &self.config).finish()
    }
}
