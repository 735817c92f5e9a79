//! Health monitoring.
//!
//! # Design Decisions
//! - Healthy means the live relayer balance meets the minimum and every
//!   chain read answered
//! - The check reports failures instead of returning them

pub mod monitor;

pub use monitor::{HealthMonitor, HealthReport};
