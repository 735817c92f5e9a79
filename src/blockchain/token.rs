//! Read-only views of the EIP-2612 payment token.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use std::sync::Arc;

use crate::blockchain::abi::IERC20Permit;
use crate::blockchain::backend::ChainBackend;
use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Version assumed for tokens that don't implement `version()`.
pub const DEFAULT_PERMIT_VERSION: &str = "1";

/// Typed calls against one token contract.
#[derive(Clone)]
pub struct TokenReader {
    backend: Arc<dyn ChainBackend>,
    token: Address,
}

impl TokenReader {
    pub fn new(backend: Arc<dyn ChainBackend>, token: Address) -> Self {
        Self { backend, token }
    }

    pub fn address(&self) -> Address {
        self.token
    }

    async fn read<C>(&self, call: C) -> BlockchainResult<C::Return>
    where
        C: SolCall + Send,
        C::Return: Send,
    {
        let tx = TransactionRequest::default()
            .with_to(self.token)
            .with_input(call.abi_encode());
        let output = self.backend.call(&tx).await?;
        C::abi_decode_returns(&output)
            .map_err(|e| BlockchainError::Decode(format!("{}: {}", C::SIGNATURE, e)))
    }

    pub async fn name(&self) -> BlockchainResult<String> {
        self.read(IERC20Permit::nameCall {}).await
    }

    /// EIP-712 domain version, `"1"` when the token has no `version()`.
    pub async fn version(&self) -> String {
        match self.read(IERC20Permit::versionCall {}).await {
            Ok(v) if !v.trim().is_empty() => v,
            Ok(_) => DEFAULT_PERMIT_VERSION.to_string(),
            Err(e) => {
                tracing::debug!(token = %self.token, error = %e, "version() unavailable, using default");
                DEFAULT_PERMIT_VERSION.to_string()
            }
        }
    }

    pub async fn decimals(&self) -> BlockchainResult<u8> {
        self.read(IERC20Permit::decimalsCall {}).await
    }

    /// Current permit nonce for `owner`.
    pub async fn nonces(&self, owner: Address) -> BlockchainResult<U256> {
        self.read(IERC20Permit::noncesCall { owner }).await
    }

    pub async fn balance_of(&self, account: Address) -> BlockchainResult<U256> {
        self.read(IERC20Permit::balanceOfCall { account }).await
    }
}

impl std::fmt::Debug for TokenReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenReader").field("token", &self.token).finish()
    }
}
