//! Reward calculation module.

pub mod calculator;

pub use calculator::{RewardCalculator, RewardError};
