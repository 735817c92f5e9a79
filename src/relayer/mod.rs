//! Relayer identity management.

pub mod identity;

pub use identity::{IdentityLease, RelayerIdentity};
