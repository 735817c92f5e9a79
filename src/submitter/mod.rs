//! Transaction submission subsystem.
//!
//! # Data Flow
//! ```text
//! validated call
//!     → fees (gas limit + price, fresh per attempt)
//!     → relayer lease (balance check, nonce, sign, broadcast)
//!     → receipt polling (lease released)
//!     → ledger (every attempt, indexed by tx hash)
//! ```

pub mod attempt;
pub mod ledger;
pub mod pipeline;

pub use attempt::{AttemptStatus, TransactionAttempt, TransitionError};
pub use ledger::{AttemptLedger, RetentionPolicy};
pub use pipeline::{ReceiptPolicy, SubmissionOutcome, TransactionSubmitter};
