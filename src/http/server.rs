//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router for the payment API
//! - Wire up middleware (tracing, request timeout)
//! - Serve on a listener until Ctrl+C

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::engine::RelayEngine;
use crate::http::handlers;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RelayEngine>,
}

/// HTTP adapter in front of a [`RelayEngine`].
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(engine: Arc<RelayEngine>, config: &ServerConfig) -> Self {
        let router = Self::build_router(AppState { engine }, config);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
        let api = Router::new()
            .route("/execute", post(handlers::execute_payment))
            .route("/config", get(handlers::payment_config))
            .route("/status/{tx_hash}", get(handlers::transaction_status))
            .route("/balance/{address}", get(handlers::token_balance))
            .route("/calculate/{amount}", get(handlers::calculate_reward))
            .route("/health", get(handlers::health));

        Router::new()
            .nest("/api/payment", api)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
