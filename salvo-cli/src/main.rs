//! SALVO CLI - Command-line interface
//!
//! Commands:
//! - serve: Start the match server
//! - legal: List legal moves for a position
//! - selfplay: Play a bot-vs-bot game and print its turn log

mod legal;
mod selfplay;
mod server;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "salvo")]
#[command(about = "SALVO turn-based artillery game server and tools")]
struct Cli {
    /// Seed for bots (random when omitted)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the match server
    Serve(server::ServerArgs),
    /// List legal moves for a position string
    Legal(legal::LegalArgs),
    /// Play a bot-vs-bot game
    Selfplay(selfplay::SelfplayArgs),
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => server::run(args),
        Commands::Legal(args) => legal::run(args),
        Commands::Selfplay(args) => selfplay::run(args, cli.seed),
    }
}
