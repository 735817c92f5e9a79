//! Gasless EIP-2612 permit relay library.

pub mod blockchain;
pub mod config;
pub mod engine;
pub mod fees;
pub mod health;
pub mod http;
pub mod observability;
pub mod permit;
pub mod relayer;
pub mod resilience;
pub mod rewards;
pub mod status;
pub mod submitter;

pub use config::schema::RelayConfig;
pub use engine::{RelayEngine, RelayError};
pub use http::HttpServer;
