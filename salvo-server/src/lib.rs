//! SALVO Server - Authoritative match service
//!
//! This crate provides the web backend:
//! - Match store with compare-and-swap turn commits
//! - REST API for creating matches and submitting turns
//! - Server-sent turn stream for players and spectators
//! - Server-side bot seats

pub mod auth;
mod routes;
mod state;
pub mod store;
pub mod subscriber;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use state::{drive_bot, ServerState};
pub use store::{MatchStore, StoreError};
pub use subscriber::{follow, Backoff, StreamError, TurnSource};

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// Reconnect policy for server-side followers (bot seats)
    pub backoff: Backoff,
    /// Frames buffered per match before slow subscribers lag
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8002,
            backoff: Backoff::default(),
            broadcast_capacity: store::DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Fresh state wired to this configuration
    pub fn build_state(&self) -> ServerState {
        let store = MatchStore::new().with_capacity(self.broadcast_capacity);
        ServerState::with_store(Arc::new(store), self.backoff)
    }
}

/// Create the router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Status endpoint
        .route("/api/status", get(routes::status::status_handler))
        // Matches
        .route("/api/matches", post(routes::matches::create_match))
        .route("/api/matches/:id", get(routes::matches::get_match))
        .route("/api/matches/:id/legal", get(routes::matches::get_legal_moves))
        .route("/api/matches/:id/turns", post(routes::matches::submit_turn))
        .route("/api/matches/:id/stream", get(routes::stream::stream_turns))
        // Pure rules boundary
        .route("/api/rules/legal", get(routes::rules::legal_for_position))
        // Shared state
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(config.build_state());
    let router = create_router(state);

    tracing::info!("SALVO Server starting on http://0.0.0.0:{}", config.port);
    tracing::info!(
        "Stream backoff {:?} doubling to {:?}, {} retries",
        config.backoff.initial,
        config.backoff.cap,
        config.backoff.max_retries
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
