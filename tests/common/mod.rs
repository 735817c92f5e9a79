//! Shared utilities for integration tests: an in-memory chain and request
//! builders.

#![allow(dead_code)]

use alloy::hex;
use alloy::primitives::{address, Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use permit_relay::blockchain::abi::{IERC20Permit, IFacilitator};
use permit_relay::blockchain::types::{
    BlockchainError, BlockchainResult, Eip1559Fees, ReceiptSummary, SignedTransaction,
};
use permit_relay::blockchain::{ChainBackend, Wallet};
use permit_relay::config::{RateEntry, RelayConfig};
use permit_relay::permit::{PaymentRequest, PermitMessage, PermitSignature, SignatureParts};
use permit_relay::RelayEngine;

pub const CHAIN_ID: u64 = 56;
pub const TOKEN: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
pub const FACILITATOR: Address = address!("cccccccccccccccccccccccccccccccccccccccc");
pub const REWARD_TOKEN: Address = address!("dddddddddddddddddddddddddddddddddddddddd");
pub const TOKEN_NAME: &str = "Tether USD";

/// Anvil account #0.
pub const RELAYER_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
/// Anvil account #1.
pub const PAYER_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub const ONE_NATIVE: u128 = 1_000_000_000_000_000_000;
pub const MIN_BALANCE_WEI: u128 = 100_000_000_000_000_000;
pub const GAS_ESTIMATE: u64 = 100_000;
pub const GAS_USED: u64 = 85_000;

/// 1 USDT (6 decimals) and its 5000-token reward (18 decimals).
pub const ONE_TOKEN: u64 = 1_000_000;
pub const ONE_TOKEN_REWARD: &str = "5000000000000000000000";

struct ChainState {
    block: u64,
    token_version: Option<String>,
    decimals: u8,
    permit_nonces: HashMap<Address, U256>,
    token_balances: HashMap<Address, U256>,
    native_balances: HashMap<Address, U256>,
    account_nonces: HashMap<Address, u64>,
    receipts: HashMap<TxHash, ReceiptSummary>,
    gas_price: u128,
    broadcast_nonces: Vec<u64>,
    stale_nonce_rejections: usize,
    estimate_calls: usize,
    fail_estimate: bool,
    revert_next: bool,
    withhold_receipts: bool,
    fail_reads: bool,
    broadcast_timeout: Option<BroadcastTimeout>,
}

/// What the node did with a broadcast whose response never arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastTimeout {
    /// The transaction was accepted and will be mined.
    Accepted,
    /// The transaction never reached the node.
    Lost,
}

/// In-memory chain hosting one EIP-2612 token and a facilitator.
///
/// Every accepted broadcast mines its own block. A `processPayment` call
/// consumes the payer's permit nonce and moves the payment amount.
pub struct FakeChain {
    relayer: Address,
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new(relayer: Address) -> Arc<Self> {
        let mut native_balances = HashMap::new();
        native_balances.insert(relayer, U256::from(ONE_NATIVE));
        Arc::new(Self {
            relayer,
            state: Mutex::new(ChainState {
                block: 100,
                token_version: Some("1".to_string()),
                decimals: 6,
                permit_nonces: HashMap::new(),
                token_balances: HashMap::new(),
                native_balances,
                account_nonces: HashMap::new(),
                receipts: HashMap::new(),
                gas_price: 3_000_000_000,
                broadcast_nonces: Vec::new(),
                stale_nonce_rejections: 0,
                estimate_calls: 0,
                fail_estimate: false,
                revert_next: false,
                withhold_receipts: false,
                fail_reads: false,
                broadcast_timeout: None,
            }),
        })
    }

    fn with<T>(&self, f: impl FnOnce(&mut ChainState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn set_token_balance(&self, owner: Address, amount: U256) {
        self.with(|s| s.token_balances.insert(owner, amount));
    }

    pub fn token_balance(&self, owner: Address) -> U256 {
        self.with(|s| s.token_balances.get(&owner).copied().unwrap_or_default())
    }

    pub fn set_native_balance(&self, owner: Address, amount: U256) {
        self.with(|s| s.native_balances.insert(owner, amount));
    }

    pub fn permit_nonce(&self, owner: Address) -> U256 {
        self.with(|s| s.permit_nonces.get(&owner).copied().unwrap_or_default())
    }

    pub fn set_gas_price(&self, wei: u128) {
        self.with(|s| s.gas_price = wei);
    }

    pub fn set_token_version(&self, version: Option<&str>) {
        self.with(|s| s.token_version = version.map(str::to_string));
    }

    pub fn fail_gas_estimation(&self, fail: bool) {
        self.with(|s| s.fail_estimate = fail);
    }

    pub fn revert_next(&self) {
        self.with(|s| s.revert_next = true);
    }

    pub fn withhold_receipts(&self, withhold: bool) {
        self.with(|s| s.withhold_receipts = withhold);
    }

    /// Time out the next broadcast after the node does `outcome` with it.
    pub fn time_out_next_broadcast(&self, outcome: BroadcastTimeout) {
        self.with(|s| s.broadcast_timeout = Some(outcome));
    }

    /// Make every read fail as if the node were unreachable.
    pub fn fail_reads(&self, fail: bool) {
        self.with(|s| s.fail_reads = fail);
    }

    /// Another sender spent the relayer's next nonce.
    pub fn external_transaction(&self) {
        let relayer = self.relayer;
        self.with(|s| *s.account_nonces.entry(relayer).or_default() += 1);
    }

    /// Nonces of accepted relayer broadcasts, in acceptance order.
    pub fn broadcast_nonces(&self) -> Vec<u64> {
        self.with(|s| s.broadcast_nonces.clone())
    }

    /// Broadcasts rejected for reusing an already-spent nonce.
    pub fn stale_nonce_rejections(&self) -> usize {
        self.with(|s| s.stale_nonce_rejections)
    }

    pub fn estimate_calls(&self) -> usize {
        self.with(|s| s.estimate_calls)
    }

    pub fn height(&self) -> u64 {
        self.with(|s| s.block)
    }

    /// Mine an empty block.
    pub fn mine(&self) {
        self.with(|s| s.block += 1);
    }

    fn check_reads(&self) -> BlockchainResult<()> {
        if self.with(|s| s.fail_reads) {
            return Err(BlockchainError::Timeout(10));
        }
        Ok(())
    }

    fn apply_payment(state: &mut ChainState, input: &[u8]) -> bool {
        let Ok(call) = IFacilitator::processPaymentCall::abi_decode(input) else {
            return false;
        };
        if call.paymentToken != TOKEN {
            return false;
        }
        let balance = state.token_balances.entry(call.payer).or_default();
        if *balance < call.paymentAmount {
            return false;
        }
        *balance -= call.paymentAmount;
        *state.token_balances.entry(FACILITATOR).or_default() += call.paymentAmount;
        *state.permit_nonces.entry(call.payer).or_default() += U256::from(1);
        true
    }
}

fn input_of(tx: &TransactionRequest) -> Bytes {
    tx.input.input().cloned().unwrap_or_default()
}

#[async_trait]
impl ChainBackend for FakeChain {
    async fn chain_id(&self) -> BlockchainResult<u64> {
        Ok(CHAIN_ID)
    }

    async fn block_number(&self) -> BlockchainResult<u64> {
        self.check_reads()?;
        Ok(self.height())
    }

    async fn block_timestamp(&self, block_number: u64) -> BlockchainResult<Option<u64>> {
        self.check_reads()?;
        Ok(Some(1_700_000_000 + block_number * 3))
    }

    async fn balance(&self, address: Address) -> BlockchainResult<U256> {
        self.check_reads()?;
        Ok(self.with(|s| s.native_balances.get(&address).copied().unwrap_or_default()))
    }

    async fn pending_nonce(&self, address: Address) -> BlockchainResult<u64> {
        self.check_reads()?;
        Ok(self.with(|s| s.account_nonces.get(&address).copied().unwrap_or_default()))
    }

    async fn gas_price(&self) -> BlockchainResult<u128> {
        self.check_reads()?;
        Ok(self.with(|s| s.gas_price))
    }

    async fn eip1559_fees(&self) -> BlockchainResult<Eip1559Fees> {
        self.check_reads()?;
        let price = self.with(|s| s.gas_price);
        Ok(Eip1559Fees {
            max_fee_per_gas: price * 2,
            max_priority_fee_per_gas: price / 3,
        })
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> BlockchainResult<u64> {
        let fail = self.with(|s| {
            s.estimate_calls += 1;
            s.fail_estimate
        });
        if fail {
            return Err(BlockchainError::Rpc("execution reverted: simulation failed".into()));
        }
        Ok(GAS_ESTIMATE)
    }

    async fn call(&self, tx: &TransactionRequest) -> BlockchainResult<Bytes> {
        self.check_reads()?;
        let input = input_of(tx);
        if input.len() < 4 {
            return Err(BlockchainError::Reverted("execution reverted".into()));
        }
        let selector: [u8; 4] = [input[0], input[1], input[2], input[3]];

        self.with(|s| {
            let out = if selector == IERC20Permit::nameCall::SELECTOR {
                IERC20Permit::nameCall::abi_encode_returns(&TOKEN_NAME.to_string())
            } else if selector == IERC20Permit::versionCall::SELECTOR {
                match &s.token_version {
                    Some(v) => IERC20Permit::versionCall::abi_encode_returns(v),
                    None => return Err(BlockchainError::Reverted("execution reverted".into())),
                }
            } else if selector == IERC20Permit::decimalsCall::SELECTOR {
                IERC20Permit::decimalsCall::abi_encode_returns(&s.decimals)
            } else if selector == IERC20Permit::noncesCall::SELECTOR {
                let call = IERC20Permit::noncesCall::abi_decode(&input)
                    .map_err(|e| BlockchainError::Decode(e.to_string()))?;
                let nonce = s.permit_nonces.get(&call.owner).copied().unwrap_or_default();
                IERC20Permit::noncesCall::abi_encode_returns(&nonce)
            } else if selector == IERC20Permit::balanceOfCall::SELECTOR {
                let call = IERC20Permit::balanceOfCall::abi_decode(&input)
                    .map_err(|e| BlockchainError::Decode(e.to_string()))?;
                let balance = s.token_balances.get(&call.account).copied().unwrap_or_default();
                IERC20Permit::balanceOfCall::abi_encode_returns(&balance)
            } else {
                return Err(BlockchainError::Reverted("execution reverted".into()));
            };
            Ok(Bytes::from(out))
        })
    }

    async fn send_raw_transaction(&self, tx: &SignedTransaction) -> BlockchainResult<TxHash> {
        let relayer = self.relayer;
        self.with(|s| {
            let timeout = s.broadcast_timeout.take();
            if timeout == Some(BroadcastTimeout::Lost) {
                return Err(BlockchainError::Timeout(10));
            }

            let expected = s.account_nonces.get(&relayer).copied().unwrap_or_default();
            if tx.nonce < expected {
                s.stale_nonce_rejections += 1;
                return Err(BlockchainError::from_send_error(format!(
                    "nonce too low: next nonce {}, tx nonce {}",
                    expected, tx.nonce
                )));
            }
            if tx.nonce > expected {
                return Err(BlockchainError::from_send_error(format!(
                    "nonce too high: next nonce {}, tx nonce {}",
                    expected, tx.nonce
                )));
            }

            s.account_nonces.insert(relayer, expected + 1);
            s.broadcast_nonces.push(tx.nonce);
            s.block += 1;

            let success = if std::mem::take(&mut s.revert_next) {
                false
            } else {
                tx.to == Some(FACILITATOR) && Self::apply_payment(s, &tx.input)
            };

            s.receipts.insert(
                tx.hash,
                ReceiptSummary {
                    tx_hash: tx.hash,
                    block_number: s.block,
                    gas_used: GAS_USED,
                    success,
                },
            );
            if timeout == Some(BroadcastTimeout::Accepted) {
                return Err(BlockchainError::Timeout(10));
            }
            Ok(tx.hash)
        })
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ReceiptSummary>> {
        self.check_reads()?;
        Ok(self.with(|s| {
            if s.withhold_receipts {
                None
            } else {
                s.receipts.get(&tx_hash).copied()
            }
        }))
    }
}

pub fn relayer_wallet() -> Wallet {
    Wallet::from_private_key(RELAYER_KEY, CHAIN_ID).unwrap()
}

pub fn payer() -> PrivateKeySigner {
    PAYER_KEY.parse().unwrap()
}

/// Configuration pointing at the fake chain, with fast polling and retries.
pub fn test_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.blockchain.chain_id = CHAIN_ID;
    config.blockchain.receipt_poll_interval_ms = 5;
    config.blockchain.receipt_timeout_secs = 2;
    config.contracts.facilitator = FACILITATOR.to_string();
    config.contracts.payment_token = TOKEN.to_string();
    config.contracts.reward_token = REWARD_TOKEN.to_string();
    config.relayer.min_balance_wei = MIN_BALANCE_WEI.to_string();
    config.relayer.retry_base_delay_ms = 1;
    config.relayer.retry_max_delay_ms = 5;
    config.rewards.rates = vec![
        RateEntry::new("1", "5000"),
        RateEntry::new("5", "27000"),
        RateEntry::new("10", "55000"),
    ];
    config
}

/// Fake chain plus an engine wired to it.
pub fn setup() -> (Arc<FakeChain>, RelayEngine) {
    setup_with(test_config())
}

pub fn setup_with(config: RelayConfig) -> (Arc<FakeChain>, RelayEngine) {
    let wallet = relayer_wallet();
    let chain = FakeChain::new(wallet.address());
    let engine = RelayEngine::new(config, chain.clone(), wallet).unwrap();
    (chain, engine)
}

pub fn now() -> u64 {
    permit_relay::permit::verifier::unix_now()
}

/// Sign a permit over the chain's current nonce for `signer`.
pub fn sign_permit(
    chain: &FakeChain,
    signer: &PrivateKeySigner,
    value: U256,
    deadline: u64,
) -> PermitSignature {
    let permit = PermitMessage {
        owner: signer.address(),
        spender: FACILITATOR,
        value,
        nonce: chain.permit_nonce(signer.address()),
        deadline: U256::from(deadline),
        chain_id: CHAIN_ID,
        verifying_contract: TOKEN,
        token_name: TOKEN_NAME.to_string(),
        token_version: "1".to_string(),
    };
    signer.sign_hash_sync(&permit.signing_hash()).unwrap().into()
}

pub fn request_from(
    owner: Address,
    amount: u64,
    reward: &str,
    deadline: u64,
    signature: &PermitSignature,
) -> PaymentRequest {
    PaymentRequest {
        user_address: owner.to_string(),
        payment_token_address: TOKEN.to_string(),
        payment_amount: amount.to_string(),
        reward_amount: reward.to_string(),
        deadline,
        signature: SignatureParts {
            v: Some(signature.v),
            r: Some(hex::encode_prefixed(signature.r)),
            s: Some(hex::encode_prefixed(signature.s)),
        },
        nonce: None,
    }
}

/// A valid 1-token payment request from `signer`, funded on the chain.
pub fn funded_request(chain: &FakeChain, signer: &PrivateKeySigner) -> PaymentRequest {
    chain.set_token_balance(signer.address(), U256::from(10 * ONE_TOKEN));
    let deadline = now() + 3600;
    let signature = sign_permit(chain, signer, U256::from(ONE_TOKEN), deadline);
    request_from(signer.address(), ONE_TOKEN, ONE_TOKEN_REWARD, deadline, &signature)
}
