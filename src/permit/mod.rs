//! Permit signature verification module.

pub mod types;
pub mod verifier;

pub use types::{PaymentRequest, PermitMessage, PermitSignature, SignatureParts};
pub use verifier::{verify, verify_at, PermitError, PermitVerifier, Verification, VerifiedPermit};
