//! Request orchestration.
//!
//! # Flow
//! ```text
//! PaymentRequest
//!     → request checks (addresses, amounts, signature shape, token, deadline)
//!     → payer token balance
//!     → permit verification (live domain + nonce)
//!     → reward recomputation and comparison
//!     → processPayment calldata
//!     → TransactionSubmitter (fees, lease, broadcast, receipt)
//!     → PaymentResponse
//! ```

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::sol_types::SolCall;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::blockchain::abi::IFacilitator;
use crate::blockchain::backend::ChainBackend;
use crate::blockchain::token::TokenReader;
use crate::blockchain::types::BlockchainError;
use crate::blockchain::wallet::Wallet;
use crate::config::validation::{validate_config, ValidationError};
use crate::config::{ConfigError, RateEntry, RelayConfig};
use crate::engine::error::{ErrorBody, RelayError};
use crate::fees::FeeEstimator;
use crate::health::{HealthMonitor, HealthReport};
use crate::observability::metrics;
use crate::permit::verifier::{unix_now, PermitVerifier};
use crate::permit::{PaymentRequest, PermitSignature};
use crate::relayer::RelayerIdentity;
use crate::resilience::backoff::RetryPolicy;
use crate::rewards::RewardCalculator;
use crate::status::{StatusTracker, TxStatusReport};
use crate::submitter::{AttemptLedger, ReceiptPolicy, RetentionPolicy, TransactionSubmitter};

/// A relayed payment that confirmed on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub request_id: String,
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    pub payment_amount: U256,
    pub reward_amount: U256,
}

/// Caller-facing result of [`RelayEngine::process_payment`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<String>,
    pub payment_amount: String,
    pub reward_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfig {
    pub facilitator_address: Address,
    pub reward_token_address: Address,
    pub payment_token_address: Address,
    pub payment_rates: Vec<RateEntry>,
    pub chain_id: u64,
    pub network: String,
    pub payment_decimals: u8,
    pub reward_decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub address: Address,
    pub raw: String,
    pub formatted: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardQuote {
    pub payment_amount: String,
    pub reward_amount: String,
    pub reward_formatted: String,
}

/// The relay core. Cheap to clone; all clones share one relayer identity.
#[derive(Clone)]
pub struct RelayEngine {
    config: Arc<RelayConfig>,
    facilitator: Address,
    reward_token: Address,
    token: TokenReader,
    verifier: PermitVerifier,
    rewards: RewardCalculator,
    submitter: TransactionSubmitter,
    status: StatusTracker,
    health: HealthMonitor,
}

impl RelayEngine {
    /// Wire every component over `backend`, signing with `wallet`.
    pub fn new(
        config: RelayConfig,
        backend: Arc<dyn ChainBackend>,
        wallet: Wallet,
    ) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let facilitator = config_address("contracts.facilitator", &config.contracts.facilitator)?;
        let payment_token =
            config_address("contracts.payment_token", &config.contracts.payment_token)?;
        let reward_token = config_address("contracts.reward_token", &config.contracts.reward_token)?;
        let min_balance: U256 = config.relayer.min_balance_wei.parse().map_err(|_| {
            invalid("relayer.min_balance_wei", "not a decimal integer")
        })?;
        let rewards = RewardCalculator::new(&config.rewards)
            .map_err(|e| invalid("rewards", e.to_string()))?;

        if wallet.chain_id() != config.blockchain.chain_id {
            return Err(invalid(
                "blockchain.chain_id",
                format!("wallet signs for chain {}", wallet.chain_id()),
            ));
        }

        let token = TokenReader::new(backend.clone(), payment_token);
        let verifier = PermitVerifier::new(token.clone(), config.blockchain.chain_id, facilitator);
        let identity = RelayerIdentity::new(wallet, backend.clone(), min_balance);
        let fees = FeeEstimator::new(backend.clone(), config.fees.clone());
        let ledger = AttemptLedger::with_retention(RetentionPolicy::from(&config.relayer));
        let retry = RetryPolicy {
            max_attempts: config.relayer.max_submission_attempts,
            base_delay_ms: config.relayer.retry_base_delay_ms,
            max_delay_ms: config.relayer.retry_max_delay_ms,
        };
        let submitter = TransactionSubmitter::new(
            backend.clone(),
            identity.clone(),
            fees.clone(),
            ledger.clone(),
            retry,
            ReceiptPolicy::from(&config.blockchain),
        );
        let status = StatusTracker::new(backend.clone(), ledger);
        let health = HealthMonitor::new(
            backend,
            identity.clone(),
            fees,
            config.blockchain.network_name.clone(),
        );

        tracing::info!(
            relayer = %identity.address(),
            facilitator = %facilitator,
            payment_token = %payment_token,
            chain_id = config.blockchain.chain_id,
            "Relay engine ready"
        );

        Ok(Self {
            config: Arc::new(config),
            facilitator,
            reward_token,
            token,
            verifier,
            rewards,
            submitter,
            status,
            health,
        })
    }

    pub fn relayer_address(&self) -> Address {
        self.submitter.identity().address()
    }

    pub fn ledger(&self) -> &AttemptLedger {
        self.submitter.ledger()
    }

    /// Process a payment request to a terminal, caller-facing response.
    pub async fn process_payment(&self, request: PaymentRequest) -> PaymentResponse {
        let request_id = Uuid::new_v4().to_string();
        match self.execute_payment(&request_id, &request).await {
            Ok(receipt) => {
                metrics::record_request("success");
                PaymentResponse {
                    success: true,
                    request_id,
                    tx_hash: Some(receipt.tx_hash),
                    block_number: Some(receipt.block_number),
                    gas_used: Some(receipt.gas_used.to_string()),
                    payment_amount: receipt.payment_amount.to_string(),
                    reward_amount: receipt.reward_amount.to_string(),
                    error: None,
                }
            }
            Err(e) => {
                metrics::record_request(e.code());
                let tx_hash = match &e {
                    RelayError::ConfirmationTimeout { tx_hash, .. } => Some(*tx_hash),
                    RelayError::Reverted { tx_hash, .. } => *tx_hash,
                    _ => None,
                };
                PaymentResponse {
                    success: false,
                    request_id,
                    tx_hash,
                    block_number: None,
                    gas_used: None,
                    payment_amount: request.payment_amount.clone(),
                    reward_amount: request.reward_amount.clone(),
                    error: Some(ErrorBody::from(&e)),
                }
            }
        }
    }

    /// Typed form of [`process_payment`](Self::process_payment).
    pub async fn execute_payment(
        &self,
        request_id: &str,
        request: &PaymentRequest,
    ) -> Result<PaymentReceipt, RelayError> {
        let owner = parse_address("userAddress", &request.user_address)?;
        let payment_token = parse_address("paymentTokenAddress", &request.payment_token_address)?;
        let payment_amount = parse_amount("paymentAmount", &request.payment_amount)?;
        let reward_amount = parse_amount("rewardAmount", &request.reward_amount)?;
        let signature = PermitSignature::try_from(&request.signature)?;
        let claimed_nonce = request
            .nonce
            .as_deref()
            .map(|n| parse_integer("nonce", n))
            .transpose()?;

        // Cheap rejections before any chain read.
        if payment_token != self.token.address() {
            return Err(RelayError::UnsupportedToken(payment_token));
        }
        let now = unix_now();
        if request.deadline <= now {
            return Err(RelayError::ExpiredSignature {
                deadline: request.deadline,
                now,
            });
        }

        tracing::info!(
            request_id,
            payer = %owner,
            amount = %payment_amount,
            "Processing payment request"
        );

        let available = self.token.balance_of(owner).await?;
        if available < payment_amount {
            return Err(RelayError::InsufficientTokenBalance {
                required: payment_amount,
                available,
            });
        }

        self.verifier
            .verify_payment(
                owner,
                payment_token,
                payment_amount,
                request.deadline,
                &signature,
                claimed_nonce,
            )
            .await?;

        let decimals = self.payment_decimals().await;
        let expected = self.rewards.calculate_reward(payment_amount, decimals)?;
        if expected != reward_amount {
            tracing::warn!(
                request_id,
                expected = %expected,
                provided = %reward_amount,
                "Reward amount mismatch"
            );
            return Err(RelayError::RewardMismatch {
                expected,
                provided: reward_amount,
            });
        }

        let calldata: Bytes = IFacilitator::processPaymentCall {
            payer: owner,
            paymentToken: payment_token,
            paymentAmount: payment_amount,
            deadline: U256::from(request.deadline),
            v: signature.v,
            r: signature.r,
            s: signature.s,
        }
        .abi_encode()
        .into();

        let outcome = self.submitter.submit(request_id, self.facilitator, calldata).await?;

        Ok(PaymentReceipt {
            request_id: request_id.to_string(),
            tx_hash: outcome.tx_hash,
            block_number: outcome.block_number,
            gas_used: outcome.gas_used,
            payment_amount,
            reward_amount,
        })
    }

    /// Token decimals from the chain, or the configured value if the read fails.
    async fn payment_decimals(&self) -> u8 {
        match self.token.decimals().await {
            Ok(d) => d,
            Err(e) => {
                let fallback = self.config.rewards.payment_decimals;
                tracing::warn!(error = %e, fallback, "decimals() unavailable, using configured value");
                fallback
            }
        }
    }

    pub fn payment_config(&self) -> PaymentConfig {
        PaymentConfig {
            facilitator_address: self.facilitator,
            reward_token_address: self.reward_token,
            payment_token_address: self.token.address(),
            payment_rates: self.rewards.rates().to_vec(),
            chain_id: self.config.blockchain.chain_id,
            network: self.config.blockchain.network_name.clone(),
            payment_decimals: self.config.rewards.payment_decimals,
            reward_decimals: self.rewards.reward_decimals(),
        }
    }

    /// Payment-token balance of `address`.
    pub async fn token_balance(&self, address: &str) -> Result<TokenBalance, RelayError> {
        let address = parse_address("address", address)?;
        let (raw, decimals) = tokio::join!(self.token.balance_of(address), self.payment_decimals());
        let raw = raw?;
        let formatted = format_units(raw, decimals)
            .map_err(|e| RelayError::Chain(BlockchainError::Decode(e.to_string())))?;
        Ok(TokenBalance {
            address,
            raw: raw.to_string(),
            formatted,
            decimals,
        })
    }

    /// Reward for a payment of `amount` smallest units at the configured
    /// payment decimals.
    pub fn quote_reward(&self, amount: &str) -> Result<RewardQuote, RelayError> {
        let payment = parse_amount("amount", amount)?;
        let reward = self
            .rewards
            .calculate_reward(payment, self.config.rewards.payment_decimals)?;
        let reward_formatted = format_units(reward, self.rewards.reward_decimals())
            .unwrap_or_else(|_| reward.to_string());
        Ok(RewardQuote {
            payment_amount: payment.to_string(),
            reward_amount: reward.to_string(),
            reward_formatted,
        })
    }

    pub async fn status(&self, tx_hash: &str) -> Result<TxStatusReport, RelayError> {
        let hash = parse_tx_hash(tx_hash)?;
        Ok(self.status.status(hash).await?)
    }

    pub async fn health_check(&self) -> HealthReport {
        self.health.health_check().await
    }
}

impl std::fmt::Debug for RelayEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayEngine")
            .field("facilitator", &self.facilitator)
            .field("payment_token", &self.token.address())
            .field("submitter", &self.submitter)
            .finish()
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(vec![ValidationError::new(field, message)])
}

fn config_address(field: &str, value: &str) -> Result<Address, ConfigError> {
    value
        .parse()
        .map_err(|_| invalid(field, format!("invalid address '{}'", value)))
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, RelayError> {
    let trimmed = value.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or("");
    if hex.len() != 40 {
        return Err(RelayError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
    trimmed.parse().map_err(|_| RelayError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

fn parse_tx_hash(value: &str) -> Result<TxHash, RelayError> {
    let trimmed = value.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or("");
    if hex.len() != 64 {
        return Err(RelayError::InvalidTxHash(value.to_string()));
    }
    trimmed
        .parse()
        .map_err(|_| RelayError::InvalidTxHash(value.to_string()))
}

/// Non-negative base-10 integer.
fn parse_integer(field: &'static str, value: &str) -> Result<U256, RelayError> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RelayError::InvalidAmount {
            field,
            value: value.to_string(),
        });
    }
    U256::from_str_radix(value, 10).map_err(|_| RelayError::InvalidAmount {
        field,
        value: value.to_string(),
    })
}

/// Positive base-10 integer.
fn parse_amount(field: &'static str, value: &str) -> Result<U256, RelayError> {
    let amount = parse_integer(field, value)?;
    if amount.is_zero() {
        return Err(RelayError::InvalidAmount {
            field,
            value: value.to_string(),
        });
    }
    Ok(amount)
}
