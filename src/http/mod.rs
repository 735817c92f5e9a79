//! HTTP adapter.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, trace + timeout layers)
//!     → handlers.rs (JSON ↔ RelayEngine calls, error category → status)
//! ```

pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer};
