//! Relayer key loading and transaction signing.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;

use crate::blockchain::types::{BlockchainError, BlockchainResult, SignedTransaction};

/// Default environment variable name for the relayer private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "RELAY_PRIVATE_KEY";

/// Signing half of the relayer identity.
#[derive(Clone)]
pub struct Wallet {
    address: Address,
    wallet: EthereumWallet,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string (with or
    /// without 0x prefix).
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let key_hex = private_key_hex.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;
        let address = signer.address();

        tracing::info!(
            address = %address,
            chain_id = chain_id,
            "Relayer wallet initialized"
        );

        Ok(Self {
            address,
            wallet: EthereumWallet::from(signer),
            chain_id,
        })
    }

    /// Load wallet from the named environment variable.
    pub fn from_env(var_name: &str, chain_id: u64) -> BlockchainResult<Self> {
        let private_key = std::env::var(var_name).map_err(|_| {
            BlockchainError::Wallet(format!("Environment variable {} not set", var_name))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign a fully populated request (nonce, gas, fees set) into a raw
    /// EIP-2718 envelope.
    pub async fn sign_transaction(&self, tx: TransactionRequest) -> BlockchainResult<SignedTransaction> {
        let tx = tx.with_from(self.address).with_chain_id(self.chain_id);
        let envelope: TxEnvelope =
            <TransactionRequest as TransactionBuilder<Ethereum>>::build(tx, &self.wallet)
                .await
                .map_err(|e| BlockchainError::Wallet(format!("Signing failed: {}", e)))?;

        Ok(SignedTransaction {
            raw: Bytes::from(envelope.encoded_2718()),
            hash: *envelope.tx_hash(),
            nonce: envelope.nonce(),
            to: envelope.to(),
            input: envelope.input().clone(),
            gas_limit: envelope.gas_limit(),
        })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}
