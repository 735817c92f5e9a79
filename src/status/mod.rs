//! Transaction status tracking.

pub mod tracker;

pub use tracker::{StatusTracker, TxState, TxStatusReport};
