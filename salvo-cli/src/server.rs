//! Server command - start the match server
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: configure_server(), start_server()
//! - Level 3: (delegated to salvo-server crate)
//! - Level 4: configuration validation

use std::time::Duration;

use anyhow::Result;
use clap::Args;

use salvo_server::{run_server, Backoff, ServerConfig};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct ServerArgs {
    /// Port number to listen on
    #[arg(long, default_value = "8002")]
    pub port: u16,

    /// First reconnect delay for bot seats, in milliseconds
    #[arg(long, default_value = "250")]
    pub backoff_initial_ms: u64,

    /// Longest reconnect delay, in milliseconds
    #[arg(long, default_value = "8000")]
    pub backoff_cap_ms: u64,

    /// Reconnect attempts before a bot seat gives up
    #[arg(long, default_value = "6")]
    pub max_retries: u32,

    /// Turn frames buffered per match before slow subscribers resync
    #[arg(long, default_value = "64")]
    pub broadcast_capacity: usize,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run server command
///
/// 1. Configure server
/// 2. Start server (blocking)
pub fn run(args: ServerArgs) -> Result<()> {
    let config = configure_server(&args)?;

    tracing::info!("Starting SALVO server on port {}", config.port);

    start_server(config)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Configure server from command arguments
fn configure_server(args: &ServerArgs) -> Result<ServerConfig> {
    validate_backoff(args)?;

    Ok(ServerConfig {
        port: args.port,
        backoff: Backoff {
            initial: Duration::from_millis(args.backoff_initial_ms),
            cap: Duration::from_millis(args.backoff_cap_ms),
            max_retries: args.max_retries,
        },
        broadcast_capacity: args.broadcast_capacity,
    })
}

/// Start the server (blocking)
fn start_server(config: ServerConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async { run_server(config).await })
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn validate_backoff(args: &ServerArgs) -> Result<()> {
    if args.backoff_initial_ms == 0 {
        anyhow::bail!("--backoff-initial-ms must be positive");
    }
    if args.backoff_cap_ms < args.backoff_initial_ms {
        anyhow::bail!(
            "--backoff-cap-ms ({}) is below --backoff-initial-ms ({})",
            args.backoff_cap_ms,
            args.backoff_initial_ms
        );
    }
    if args.broadcast_capacity == 0 {
        anyhow::bail!("--broadcast-capacity must be positive");
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
