//! EIP-2612 permit verification.
//!
//! # Steps
//! 1. Reject tokens other than the configured payment token
//! 2. Reject deadlines at or before "now"
//! 3. Rebuild the EIP-712 domain from live token metadata (`name`,
//!    `version` defaulting to "1") and read the owner's current nonce
//! 4. Recompute the typed-data digest and recover the signer
//! 5. Require the recovered signer to equal the owner
//!
//! Verification is read-only: no state is written on- or off-chain.

use alloy::primitives::{Address, U256};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::blockchain::token::TokenReader;
use crate::blockchain::types::BlockchainError;
use crate::permit::types::{PermitMessage, PermitSignature};

/// Errors from permit verification.
#[derive(Debug, Clone, Error)]
pub enum PermitError {
    #[error("permit signature expired (deadline {deadline}, now {now})")]
    ExpiredSignature { deadline: u64, now: u64 },

    #[error("signature recovers to {recovered}, not owner {expected}")]
    SignerMismatch { expected: Address, recovered: Address },

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("payment token {0} is not supported")]
    UnsupportedToken(Address),

    #[error("permit nonce mismatch: token expects {expected}, signature uses {provided}")]
    NonceMismatch { expected: U256, provided: U256 },

    #[error("token metadata unavailable: {0}")]
    Chain(#[from] BlockchainError),
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    pub signer: Address,
}

/// A permit that verified against live token state.
#[derive(Debug, Clone)]
pub struct VerifiedPermit {
    pub permit: PermitMessage,
    pub signature: PermitSignature,
    pub signer: Address,
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Verify a permit against the current wall clock.
pub fn verify(permit: &PermitMessage, signature: &PermitSignature) -> Result<Verification, PermitError> {
    verify_at(permit, signature, unix_now())
}

/// Verify a permit as of `now` (Unix seconds).
pub fn verify_at(
    permit: &PermitMessage,
    signature: &PermitSignature,
    now: u64,
) -> Result<Verification, PermitError> {
    check_deadline(permit.deadline, now)?;

    let digest = permit.signing_hash();
    let recovered = signature
        .to_signature()
        .recover_address_from_prehash(&digest)
        .map_err(|e| PermitError::MalformedSignature(format!("recovery failed: {}", e)))?;

    // Address equality is byte equality, so checksum casing never matters.
    if recovered != permit.owner {
        return Err(PermitError::SignerMismatch {
            expected: permit.owner,
            recovered,
        });
    }

    Ok(Verification {
        valid: true,
        signer: recovered,
    })
}

fn check_deadline(deadline: U256, now: u64) -> Result<(), PermitError> {
    if deadline <= U256::from(now) {
        return Err(PermitError::ExpiredSignature {
            deadline: deadline.saturating_to(),
            now,
        });
    }
    Ok(())
}

/// Verifies permits for the configured payment token and spender.
#[derive(Debug, Clone)]
pub struct PermitVerifier {
    token: TokenReader,
    chain_id: u64,
    /// The facilitator contract the permit authorizes.
    spender: Address,
}

impl PermitVerifier {
    pub fn new(token: TokenReader, chain_id: u64, spender: Address) -> Self {
        Self {
            token,
            chain_id,
            spender,
        }
    }

    pub fn token(&self) -> &TokenReader {
        &self.token
    }

    /// Assemble the permit `owner` would have signed right now, using live
    /// token metadata and nonce.
    pub async fn fetch_permit(
        &self,
        owner: Address,
        value: U256,
        deadline: u64,
    ) -> Result<PermitMessage, PermitError> {
        let (name, version, nonce) = tokio::join!(
            self.token.name(),
            self.token.version(),
            self.token.nonces(owner)
        );

        Ok(PermitMessage {
            owner,
            spender: self.spender,
            value,
            nonce: nonce?,
            deadline: U256::from(deadline),
            chain_id: self.chain_id,
            verifying_contract: self.token.address(),
            token_name: name?,
            token_version: version,
        })
    }

    /// Full verification of a payer's permit.
    ///
    /// `claimed_nonce` is the nonce the caller says it signed over. When it is
    /// absent and the signature fails against the current nonce, the previous
    /// nonce is tried so a replayed permit is reported as a nonce mismatch
    /// instead of a bare signer mismatch.
    pub async fn verify_payment(
        &self,
        owner: Address,
        payment_token: Address,
        value: U256,
        deadline: u64,
        signature: &PermitSignature,
        claimed_nonce: Option<U256>,
    ) -> Result<VerifiedPermit, PermitError> {
        if payment_token != self.token.address() {
            return Err(PermitError::UnsupportedToken(payment_token));
        }
        let now = unix_now();
        check_deadline(U256::from(deadline), now)?;

        let permit = self.fetch_permit(owner, value, deadline).await?;

        if let Some(provided) = claimed_nonce {
            if provided != permit.nonce {
                tracing::warn!(
                    owner = %owner,
                    expected = %permit.nonce,
                    provided = %provided,
                    "Permit nonce mismatch"
                );
                return Err(PermitError::NonceMismatch {
                    expected: permit.nonce,
                    provided,
                });
            }
        }

        match verify_at(&permit, signature, now) {
            Ok(verification) => {
                tracing::debug!(owner = %owner, nonce = %permit.nonce, "Permit signature verified");
                Ok(VerifiedPermit {
                    signer: verification.signer,
                    signature: *signature,
                    permit,
                })
            }
            Err(PermitError::SignerMismatch { expected, recovered })
                if claimed_nonce.is_none() && !permit.nonce.is_zero() =>
            {
                let previous = permit.nonce - U256::from(1);
                if verify_at(&permit.with_nonce(previous), signature, now).is_ok() {
                    tracing::warn!(owner = %owner, nonce = %previous, "Replayed permit rejected");
                    return Err(PermitError::NonceMismatch {
                        expected: permit.nonce,
                        provided: previous,
                    });
                }
                tracing::warn!(owner = %owner, recovered = %recovered, "Permit signer mismatch");
                Err(PermitError::SignerMismatch { expected, recovered })
            }
            Err(e) => {
                tracing::warn!(owner = %owner, error = %e, "Permit verification failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::local::PrivateKeySigner;
    use alloy::signers::SignerSync;

    const OWNER_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn signer() -> PrivateKeySigner {
        OWNER_KEY.parse().unwrap()
    }

    fn permit_for(owner: Address) -> PermitMessage {
        PermitMessage {
            owner,
            spender: Address::repeat_byte(0xcc),
            value: U256::from(1_000_000u64),
            nonce: U256::from(3),
            deadline: U256::from(2_000_000_000u64),
            chain_id: 56,
            verifying_contract: Address::repeat_byte(0xbb),
            token_name: "Tether USD".into(),
            token_version: "1".into(),
        }
    }

    fn sign(permit: &PermitMessage, key: &PrivateKeySigner) -> PermitSignature {
        key.sign_hash_sync(&permit.signing_hash()).unwrap().into()
    }

    const NOW: u64 = 1_900_000_000;

    #[test]
    fn test_valid_signature_recovers_owner() {
        let key = signer();
        let permit = permit_for(key.address());
        let sig = sign(&permit, &key);

        let result = verify_at(&permit, &sig, NOW).unwrap();
        assert!(result.valid);
        assert_eq!(result.signer, key.address());
    }

    #[test]
    fn test_expired_regardless_of_signature() {
        let key = signer();
        let permit = permit_for(key.address());
        let sig = sign(&permit, &key);

        let err = verify_at(&permit, &sig, 2_000_000_000).unwrap_err();
        assert!(matches!(err, PermitError::ExpiredSignature { .. }));

        let err = verify_at(&permit, &sig, 2_100_000_000).unwrap_err();
        assert!(matches!(err, PermitError::ExpiredSignature { .. }));
    }

    #[test]
    fn test_single_bit_flips_fail() {
        let key = signer();
        let permit = permit_for(key.address());
        let sig = sign(&permit, &key);

        for bit in [0usize, 7, 100, 255] {
            let mut r = sig.r;
            r.0[bit / 8] ^= 1 << (bit % 8);
            let mutated = PermitSignature { r, ..sig };
            assert!(verify_at(&permit, &mutated, NOW).is_err(), "r bit {}", bit);

            let mut s = sig.s;
            s.0[bit / 8] ^= 1 << (bit % 8);
            let mutated = PermitSignature { s, ..sig };
            assert!(verify_at(&permit, &mutated, NOW).is_err(), "s bit {}", bit);
        }

        // Flipping the low bit of v swaps the recovery parity.
        let flipped_parity = PermitSignature {
            v: if sig.v == 27 { 28 } else { 27 },
            ..sig
        };
        assert!(verify_at(&permit, &flipped_parity, NOW).is_err());
        assert!(PermitSignature::new(sig.v ^ 0b100, sig.r, sig.s).is_err());
    }

    #[test]
    fn test_other_signer_is_mismatch() {
        let key = signer();
        let other = PrivateKeySigner::random();
        let permit = permit_for(key.address());
        let sig = sign(&permit, &other);

        let err = verify_at(&permit, &sig, NOW).unwrap_err();
        assert!(matches!(
            err,
            PermitError::SignerMismatch { recovered, .. } if recovered == other.address()
        ));
    }

    #[test]
    fn test_tampered_value_fails() {
        let key = signer();
        let permit = permit_for(key.address());
        let sig = sign(&permit, &key);

        let tampered = PermitMessage {
            value: U256::from(2_000_000u64),
            ..permit
        };
        assert!(verify_at(&tampered, &sig, NOW).is_err());
    }
}
