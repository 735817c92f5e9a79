//! Gasless EIP-2612 permit relay.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client                ┌──────────────────────────────────────────────────┐
//!     POST /execute ───────▶│ http ──▶ engine                                   │
//!                           │            │                                      │
//!                           │            ├─▶ permit (verify signature + nonce)  │
//!                           │            ├─▶ rewards (recompute, compare)       │
//!                           │            └─▶ submitter                          │
//!                           │                   ├─▶ fees                        │
//!                           │                   ├─▶ relayer (lease, nonce)      │──▶ Chain RPC
//!                           │                   └─▶ receipt polling             │
//!     GET /status ─────────▶│ status                                            │
//!     GET /health ─────────▶│ health                                            │
//!                           └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use permit_relay::blockchain::{BlockchainClient, ChainBackend, Wallet};
use permit_relay::config::{self, RelayConfig};
use permit_relay::engine::RelayEngine;
use permit_relay::http::HttpServer;
use permit_relay::observability;

#[derive(Parser)]
#[command(name = "permit-relay")]
#[command(about = "Gasless EIP-2612 payment relayer", long_about = None)]
struct Args {
    /// TOML configuration file. Without it, defaults plus RELAY_* variables are used.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config: RelayConfig = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::loader::load_from_env()?,
    };

    observability::logging::init(&config.observability);
    tracing::info!("permit-relay v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.server.bind_address,
        chain_id = config.blockchain.chain_id,
        network = %config.blockchain.network_name,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            observability::metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let wallet = Wallet::from_env(&config.relayer.private_key_env, config.blockchain.chain_id)?;
    let client: Arc<dyn ChainBackend> =
        Arc::new(BlockchainClient::new(config.blockchain.clone()).await?);

    let server_config = config.server.clone();
    let engine = Arc::new(RelayEngine::new(config, client, wallet)?);

    let listener = TcpListener::bind(&server_config.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    HttpServer::new(engine, &server_config).run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
