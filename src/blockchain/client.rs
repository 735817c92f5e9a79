//! Blockchain RPC client with timeout and failover.
//!
//! # Responsibilities
//! - Connect to JSON-RPC endpoints (primary + failovers, tried in order)
//! - Query chain state (block number, balances, nonces, receipts, fees)
//! - Broadcast raw transactions and classify node rejections
//! - Bound every call with the configured timeout

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::TransportResult;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::backend::ChainBackend;
use crate::blockchain::types::{
    BlockchainConfig, BlockchainError, BlockchainResult, Eip1559Fees, ReceiptSummary,
    SignedTransaction,
};

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// Blockchain RPC client wrapper with failover support.
#[derive(Clone)]
pub struct BlockchainClient {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider>,
    config: BlockchainConfig,
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Create a new blockchain client.
    ///
    /// Chain ID verification failure is logged, not fatal, so the relay can
    /// start while the endpoint is degraded.
    pub async fn new(config: BlockchainConfig) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url)) as DynProvider);

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider);
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    "Blockchain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Blockchain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let actual = ChainBackend::chain_id(self).await?;
        if actual != self.config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.config.chain_id,
                actual,
            });
        }
        Ok(())
    }

    /// Run a read against each provider in turn until one answers in time.
    async fn with_failover<T, F, Fut>(&self, op: &'static str, f: F) -> BlockchainResult<T>
    where
        F: Fn(DynProvider) -> Fut + Send + Sync,
        Fut: Future<Output = TransportResult<T>> + Send,
        T: Send,
    {
        let mut last_error = None;
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, f(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, op, error = %e, "RPC error, trying next provider");
                    last_error = Some(BlockchainError::Rpc(e.to_string()));
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, op, "RPC timeout, trying next provider");
                    last_error = Some(BlockchainError::Timeout(self.timeout_duration.as_secs()));
                }
            }
        }
        Err(match last_error {
            Some(BlockchainError::Timeout(secs)) => BlockchainError::Timeout(secs),
            Some(e) => BlockchainError::Rpc(format!("All RPC providers failed to {}: {}", op, e)),
            None => BlockchainError::Rpc(format!("All RPC providers failed to {}", op)),
        })
    }
}

#[async_trait]
impl ChainBackend for BlockchainClient {
    async fn chain_id(&self) -> BlockchainResult<u64> {
        self.with_failover("get chain id", |p| async move { p.get_chain_id().await })
            .await
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        self.with_failover("get block number", |p| async move { p.get_block_number().await })
            .await
    }

    async fn block_timestamp(&self, block_number: u64) -> BlockchainResult<Option<u64>> {
        let block = self
            .with_failover("get block", |p| async move {
                p.get_block_by_number(BlockNumberOrTag::Number(block_number)).await
            })
            .await?;
        Ok(block.map(|b| b.header.inner.timestamp))
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.with_failover("get balance", |p| async move { p.get_balance(address).await })
            .await
    }

    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64> {
        self.with_failover("get transaction count", |p| async move {
            p.get_transaction_count(address).pending().await
        })
        .await
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.with_failover("get gas price", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn eip1559_fees(&self) -> BlockchainResult<Eip1559Fees> {
        let estimate = self
            .with_failover("estimate eip1559 fees", |p| async move {
                p.estimate_eip1559_fees().await
            })
            .await?;
        Ok(Eip1559Fees {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> BlockchainResult<u64> {
        self.with_failover("estimate gas", |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(tx).await }
        })
        .await
    }

    async fn call(&self, tx: &TransactionRequest) -> BlockchainResult<Bytes> {
        self.with_failover("call", |p| {
            let tx = tx.clone();
            async move { p.call(tx).await }
        })
        .await
    }

    /// Broadcast through the primary only; a signed nonce goes to one node.
    async fn send_raw_transaction(&self, tx: &SignedTransaction) -> BlockchainResult<TxHash> {
        let provider = &self.providers[0];
        match timeout(self.timeout_duration, provider.send_raw_transaction(&tx.raw)).await {
            Ok(Ok(pending)) => Ok(*pending.tx_hash()),
            Ok(Err(e)) => Err(BlockchainError::from_send_error(e.to_string())),
            Err(_) => Err(BlockchainError::Timeout(self.timeout_duration.as_secs())),
        }
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        let receipt = self
            .with_failover("get receipt", |p| async move {
                p.get_transaction_receipt(tx_hash).await
            })
            .await?;
        Ok(receipt.map(|r| ReceiptSummary {
            tx_hash: r.transaction_hash,
            block_number: r.block_number.unwrap_or_default(),
            gas_used: r.gas_used,
            success: r.status(),
        }))
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
