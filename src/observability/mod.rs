//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine components produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout log aggregation
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
