//! Fee estimation.

pub mod estimator;

pub use estimator::{buffered_gas_limit, FeeEstimate, FeeEstimator, FeeParams};
