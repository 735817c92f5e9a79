//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): payment requests by outcome
//! - `relay_submissions_total` (counter): broadcast attempts by result
//! - `relay_nonce_conflicts_total` (counter): nonce rejections from the node
//! - `relay_fee_estimate_fallbacks_total` (counter): estimates that used the default gas limit
//! - `relay_confirmation_seconds` (histogram): broadcast → receipt latency
//! - `relay_relayer_balance_wei` (gauge): last observed relayer balance
//! - `relay_chain_healthy` (gauge): 1=healthy, 0=unhealthy
//!
//! Recording is a no-op until [`init_metrics`] installs a recorder.

use std::net::SocketAddr;
use std::time::Duration;

use alloy::primitives::U256;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// One payment request finished with `outcome` (`success` or an error code).
pub fn record_request(outcome: &str) {
    counter!("relay_requests_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_submission(result: &'static str) {
    counter!("relay_submissions_total", "result" => result).increment(1);
}

pub fn record_nonce_conflict() {
    counter!("relay_nonce_conflicts_total").increment(1);
}

pub fn record_fee_fallback() {
    counter!("relay_fee_estimate_fallbacks_total").increment(1);
}

pub fn record_confirmation(elapsed: Duration) {
    histogram!("relay_confirmation_seconds").record(elapsed.as_secs_f64());
}

pub fn record_relayer_balance(balance: U256) {
    // Lossy above 2^53 wei, fine for a gauge.
    let value: f64 = balance.to_string().parse().unwrap_or(f64::MAX);
    gauge!("relay_relayer_balance_wei").set(value);
}

pub fn record_chain_health(healthy: bool) {
    gauge!("relay_chain_healthy").set(if healthy { 1.0 } else { 0.0 });
}
