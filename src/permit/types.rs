//! Permit message, signature and payment request types.

use alloy::primitives::{Address, Signature, B256, U256};
use alloy::sol_types::{eip712_domain, Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};

use crate::blockchain::abi::Permit;
use crate::permit::verifier::PermitError;

/// An EIP-2612 permit plus the domain it is signed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitMessage {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub nonce: U256,
    /// Unix timestamp after which the permit is void.
    pub deadline: U256,
    pub chain_id: u64,
    /// The token contract.
    pub verifying_contract: Address,
    pub token_name: String,
    pub token_version: String,
}

impl PermitMessage {
    /// EIP-712 domain: {name, version, chainId, verifyingContract}.
    pub fn domain(&self) -> Eip712Domain {
        eip712_domain! {
            name: self.token_name.clone(),
            version: self.token_version.clone(),
            chain_id: self.chain_id,
            verifying_contract: self.verifying_contract,
        }
    }

    /// Typed-data digest the owner signed.
    pub fn signing_hash(&self) -> B256 {
        let permit = Permit {
            owner: self.owner,
            spender: self.spender,
            value: self.value,
            nonce: self.nonce,
            deadline: self.deadline,
        };
        permit.eip712_signing_hash(&self.domain())
    }

    /// Same message with a different nonce.
    pub fn with_nonce(&self, nonce: U256) -> Self {
        Self {
            nonce,
            ..self.clone()
        }
    }
}

/// Signature components as supplied by a caller. Any may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignatureParts {
    pub v: Option<u8>,
    pub r: Option<String>,
    pub s: Option<String>,
}

/// A well-formed `{v, r, s}` signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermitSignature {
    /// 27 or 28.
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

impl PermitSignature {
    /// Build from raw parts, normalizing `v` in {0, 1} to {27, 28}.
    pub fn new(v: u8, r: B256, s: B256) -> Result<Self, PermitError> {
        let v = match v {
            0 | 1 => v + 27,
            27 | 28 => v,
            other => return Err(PermitError::MalformedSignature(format!("invalid v value {}", other))),
        };
        Ok(Self { v, r, s })
    }

    pub fn y_parity(&self) -> bool {
        self.v == 28
    }

    /// Recoverable ECDSA signature.
    pub fn to_signature(&self) -> Signature {
        Signature::new(
            U256::from_be_bytes(self.r.0),
            U256::from_be_bytes(self.s.0),
            self.y_parity(),
        )
    }
}

impl From<Signature> for PermitSignature {
    fn from(sig: Signature) -> Self {
        Self {
            v: 27 + sig.v() as u8,
            r: B256::from(sig.r().to_be_bytes::<32>()),
            s: B256::from(sig.s().to_be_bytes::<32>()),
        }
    }
}

impl TryFrom<&SignatureParts> for PermitSignature {
    type Error = PermitError;

    fn try_from(parts: &SignatureParts) -> Result<Self, Self::Error> {
        let v = parts
            .v
            .ok_or_else(|| PermitError::MalformedSignature("missing v".into()))?;
        let r = parse_word("r", parts.r.as_deref())?;
        let s = parse_word("s", parts.s.as_deref())?;
        Self::new(v, r, s)
    }
}

fn parse_word(name: &str, value: Option<&str>) -> Result<B256, PermitError> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| PermitError::MalformedSignature(format!("missing {}", name)))?;
    let hex = value.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    if hex.len() != 64 {
        return Err(PermitError::MalformedSignature(format!(
            "{} must be 32 bytes, got {} hex chars",
            name,
            hex.len()
        )));
    }
    hex.parse::<B256>()
        .map_err(|e| PermitError::MalformedSignature(format!("{} is not hex: {}", name, e)))
}

/// A caller's off-chain signed payment intent. Amounts are base-10 strings in
/// smallest units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub user_address: String,
    pub payment_token_address: String,
    pub payment_amount: String,
    pub reward_amount: String,
    pub deadline: u64,
    pub signature: SignatureParts,
    /// Permit nonce the caller signed over, if the caller reports it.
    #[serde(default)]
    pub nonce: Option<String>,
}
