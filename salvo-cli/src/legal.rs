//! Legal command - list the legal moves of a position
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: list_moves(), report_moves()

use anyhow::{Context, Result};
use clap::Args;

use salvo_core::{LegalityEngine, StandardRules, STANDARD_POSITION};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct LegalArgs {
    /// Position string (standard setup when omitted)
    #[arg(default_value = STANDARD_POSITION)]
    pub position: String,

    /// Output as a JSON array
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

pub fn run(args: LegalArgs) -> Result<()> {
    let moves = list_moves(&args.position)?;
    tracing::debug!("{} legal moves", moves.len());
    report_moves(&moves, args.json)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn list_moves(position: &str) -> Result<Vec<String>> {
    StandardRules
        .legal_move_tokens(position)
        .with_context(|| format!("Invalid position: {}", position))
}

fn report_moves(moves: &[String], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(moves)?);
    } else {
        println!("{} legal moves", moves.len());
        for line in moves.chunks(10) {
            println!("  {}", line.join(" "));
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
