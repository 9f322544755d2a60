//! Example to run the SALVO server standalone
//!
//! Run with: cargo run -p salvo-server --example run_server

use salvo_server::{run_server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::default();

    println!("Starting SALVO server on port {}", config.port);
    println!("Create a match: POST http://localhost:{}/api/matches", config.port);

    run_server(config).await
}
