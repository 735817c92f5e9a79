//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the permit relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP adapter settings.
    pub server: ServerConfig,

    /// Chain connection settings.
    pub blockchain: BlockchainConfig,

    /// Facilitator and token contract addresses.
    pub contracts: ContractsConfig,

    /// Relayer identity settings.
    pub relayer: RelayerConfig,

    /// Gas and fee policy.
    pub fees: FeeConfig,

    /// Reward rate table.
    pub rewards: RewardConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Request timeout in seconds. Must cover fee estimation, broadcast and
    /// receipt waiting.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 180,
        }
    }
}

/// Blockchain connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (56 for BNB Chain, 31337 for local Anvil).
    pub chain_id: u64,

    /// Human-readable network name reported by health and config queries.
    pub network_name: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required before a receipt counts.
    pub confirmation_blocks: u32,

    /// Maximum time to wait for a receipt after broadcast.
    pub receipt_timeout_secs: u64,

    /// Receipt polling interval in milliseconds.
    pub receipt_poll_interval_ms: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://bsc-dataseed1.binance.org/".to_string(),
            failover_urls: Vec::new(),
            chain_id: 56,
            network_name: "BNB Chain".to_string(),
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            receipt_timeout_secs: 120,
            receipt_poll_interval_ms: 2000,
        }
    }
}

/// Contract addresses the relay talks to.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ContractsConfig {
    /// Facilitator contract exposing `processPayment`.
    pub facilitator: String,

    /// The only payment token accepted (must implement EIP-2612).
    pub payment_token: String,

    /// Reward token minted by the facilitator.
    pub reward_token: String,
}

/// Relayer identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayerConfig {
    /// Name of the environment variable holding the private key.
    pub private_key_env: String,

    /// Minimum native balance (wei) required to submit. Decimal string.
    pub min_balance_wei: String,

    /// Maximum submission attempts per request (first try included).
    pub max_submission_attempts: u32,

    /// Base delay for retry backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay for retry backoff in milliseconds.
    pub retry_max_delay_ms: u64,

    /// Seconds an attempt is kept in the ledger after its last update.
    pub ledger_retention_secs: u64,

    /// Soft cap on ledger entries; finished attempts are evicted oldest first.
    pub ledger_max_entries: usize,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            private_key_env: "RELAY_PRIVATE_KEY".to_string(),
            min_balance_wei: "100000000000000000".to_string(), // 0.1 native
            max_submission_attempts: 2,
            retry_base_delay_ms: 250,
            retry_max_delay_ms: 2000,
            ledger_retention_secs: 86_400,
            ledger_max_entries: 10_000,
        }
    }
}

/// Gas and fee policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Safety multiplier applied to live gas estimates (1.2 = 20% buffer).
    pub gas_limit_multiplier: f64,

    /// Gas limit used when live estimation fails.
    pub default_gas_limit: u64,

    /// Use EIP-1559 fee fields instead of legacy gas price.
    pub eip1559: bool,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            gas_limit_multiplier: 1.2,
            default_gas_limit: 300_000,
            eip1559: false,
            max_gas_price_gwei: 500,
        }
    }
}

/// One row of the ordered rate table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateEntry {
    /// Human-scale payment amount, e.g. "5".
    pub amount: String,
    /// Human-scale reward amount, e.g. "27000".
    pub reward: String,
}

impl RateEntry {
    pub fn new(amount: &str, reward: &str) -> Self {
        Self {
            amount: amount.to_string(),
            reward: reward.to_string(),
        }
    }
}

/// Reward configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Ordered rate table; the first matching entry wins.
    pub rates: Vec<RateEntry>,

    /// Reward per one whole payment unit when no table entry matches.
    pub base_rate: String,

    /// Reward token decimals.
    pub reward_decimals: u8,

    /// Payment token decimals used when the token cannot be queried.
    pub payment_decimals: u8,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            rates: vec![
                RateEntry::new("1", "5000"),
                RateEntry::new("5", "27000"),
                RateEntry::new("10", "55000"),
            ],
            base_rate: "5000".to_string(),
            reward_decimals: 18,
            payment_decimals: 6,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "permit_relay=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
