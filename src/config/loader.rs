//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid environment override {name}: {message}")]
    Env { name: &'static str, message: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides, and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: RelayConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build configuration from defaults plus environment only.
pub fn load_from_env() -> Result<RelayConfig, ConfigError> {
    let mut config = RelayConfig::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `RELAY_*` overrides using the given lookup.
pub fn apply_env_overrides<F>(config: &mut RelayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("RELAY_RPC_URL") {
        config.blockchain.rpc_url = v;
    }
    if let Some(v) = lookup("RELAY_CHAIN_ID") {
        config.blockchain.chain_id = v.parse().map_err(|e| ConfigError::Env {
            name: "RELAY_CHAIN_ID",
            message: format!("{}", e),
        })?;
    }
    if let Some(v) = lookup("RELAY_FACILITATOR_ADDRESS") {
        config.contracts.facilitator = v;
    }
    if let Some(v) = lookup("RELAY_PAYMENT_TOKEN_ADDRESS") {
        config.contracts.payment_token = v;
    }
    if let Some(v) = lookup("RELAY_REWARD_TOKEN_ADDRESS") {
        config.contracts.reward_token = v;
    }
    if let Some(v) = lookup("RELAY_MIN_BALANCE_WEI") {
        config.relayer.min_balance_wei = v;
    }
    if let Some(v) = lookup("RELAY_BIND_ADDRESS") {
        config.server.bind_address = v;
    }
    Ok(())
}
