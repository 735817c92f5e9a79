//! Relayer liveness report.
//!
//! [`HealthMonitor::health_check`] never fails. Sub-check errors turn the
//! report unhealthy and are listed in `error`, so monitoring keeps getting
//! answers while the chain endpoint is degraded.

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, U256};
use serde::Serialize;
use std::sync::Arc;

use crate::blockchain::backend::ChainBackend;
use crate::fees::FeeEstimator;
use crate::observability::metrics;
use crate::relayer::RelayerIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub healthy: bool,
    pub relayer_address: Address,
    pub network: String,
    /// Native balance in wei.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    /// Native balance in whole tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_formatted: Option<String>,
    pub min_balance: String,
    /// Current gas price (or max fee per gas) in wei.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_estimate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct HealthMonitor {
    backend: Arc<dyn ChainBackend>,
    identity: RelayerIdentity,
    fees: FeeEstimator,
    network: String,
}

impl HealthMonitor {
    pub fn new(
        backend: Arc<dyn ChainBackend>,
        identity: RelayerIdentity,
        fees: FeeEstimator,
        network: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            identity,
            fees,
            network: network.into(),
        }
    }

    pub async fn health_check(&self) -> HealthReport {
        let (balance, fee, height) = tokio::join!(
            self.identity.current_balance(),
            self.fees.current_fee_params(),
            self.backend.block_number()
        );

        let mut errors = Vec::new();
        let mut healthy = true;

        let balance = match balance {
            Ok(b) => {
                metrics::record_relayer_balance(b);
                if !self.identity.has_sufficient_balance(b) {
                    healthy = false;
                    errors.push(format!(
                        "relayer balance {} wei below minimum {} wei",
                        b,
                        self.identity.min_balance_threshold()
                    ));
                }
                Some(b)
            }
            Err(e) => {
                healthy = false;
                errors.push(format!("balance check failed: {}", e));
                None
            }
        };

        let fee_estimate = match fee {
            Ok(params) => Some(params.max_price_per_gas().to_string()),
            Err(e) => {
                healthy = false;
                errors.push(format!("fee lookup failed: {}", e));
                None
            }
        };

        metrics::record_chain_health(height.is_ok());
        let current_height = match height {
            Ok(h) => Some(h),
            Err(e) => {
                healthy = false;
                errors.push(format!("block height unavailable: {}", e));
                None
            }
        };

        if !healthy {
            tracing::warn!(errors = ?errors, "Relayer unhealthy");
        }

        HealthReport {
            healthy,
            relayer_address: self.identity.address(),
            network: self.network.clone(),
            balance: balance.map(|b| b.to_string()),
            balance_formatted: balance.and_then(format_native),
            min_balance: self.identity.min_balance_threshold().to_string(),
            fee_estimate,
            current_height,
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        }
    }
}

fn format_native(wei: U256) -> Option<String> {
    format_units(wei, "ether").ok()
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("identity", &self.identity)
            .field("network", &self.network)
            .finish()
    }
}
