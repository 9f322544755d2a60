//! Selfplay command - greedy bots play each other
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: play_series(), report_results()
//! - Level 3: play_single_game(), compute_statistics()
//! - Level 4: formatting utilities

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use salvo_core::{log, selfplay, GreedyBot, Outcome, Player, Position, STANDARD_POSITION};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct SelfplayArgs {
    /// Number of games to play
    #[arg(long, default_value = "1")]
    pub games: usize,

    /// Turn limit per game; unfinished games count as unresolved
    #[arg(long, default_value = "200")]
    pub max_turns: u32,

    /// Moves each bot makes before skipping
    #[arg(long, default_value = "2")]
    pub moves_per_turn: usize,

    /// Start position string
    #[arg(long, default_value = STANDARD_POSITION)]
    pub position: String,

    /// Print each game's turn log
    #[arg(long)]
    pub show_log: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Result of a single game
#[derive(Clone, Debug, Serialize)]
struct GameRecord {
    game_number: usize,
    seed: u64,
    outcome: Option<Outcome>,
    turns: usize,
    log: String,
}

/// Aggregated series results
#[derive(Clone, Debug, Default, Serialize)]
struct SeriesResults {
    red_wins: usize,
    blue_wins: usize,
    draws: usize,
    unresolved: usize,
    avg_turns: f32,
    games: Vec<GameRecord>,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run selfplay command
///
/// 1. Parse the start position
/// 2. Play the series
/// 3. Report results
pub fn run(args: SelfplayArgs, seed: Option<u64>) -> Result<()> {
    let start: Position = args
        .position
        .parse()
        .with_context(|| format!("Invalid position: {}", args.position))?;
    let base_seed = seed.unwrap_or_else(rand::random);

    tracing::info!(
        "Starting selfplay: {} games, {} moves per turn, seed {}",
        args.games,
        args.moves_per_turn,
        base_seed
    );

    let results = play_series(&start, &args, base_seed)?;
    report_results(&results, &args)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn play_series(start: &Position, args: &SelfplayArgs, base_seed: u64) -> Result<SeriesResults> {
    let mut games = Vec::with_capacity(args.games);

    for game_num in 0..args.games {
        let seed = base_seed.wrapping_add(game_num as u64);
        let record = play_single_game(start, game_num + 1, seed, args)?;

        tracing::info!(
            "Game {}: {} in {} turns",
            record.game_number,
            describe(record.outcome),
            record.turns
        );
        games.push(record);
    }

    Ok(compute_statistics(games))
}

fn report_results(results: &SeriesResults, args: &SelfplayArgs) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(results)?);
    } else {
        print_text_results(results, args.show_log);
    }
    Ok(())
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn play_single_game(
    start: &Position,
    game_number: usize,
    seed: u64,
    args: &SelfplayArgs,
) -> Result<GameRecord> {
    // distinct streams for the two seats
    let mut red = GreedyBot::with_seed(seed.wrapping_mul(2)).moves_per_turn(args.moves_per_turn);
    let mut blue =
        GreedyBot::with_seed(seed.wrapping_mul(2).wrapping_add(1)).moves_per_turn(args.moves_per_turn);

    let composer = selfplay(start.clone(), &mut red, &mut blue, args.max_turns)
        .with_context(|| format!("Game {} failed", game_number))?;

    Ok(GameRecord {
        game_number,
        seed,
        outcome: composer.outcome(),
        turns: composer.turns().len(),
        log: log::serialize(composer.turns()),
    })
}

fn compute_statistics(games: Vec<GameRecord>) -> SeriesResults {
    let mut results = SeriesResults::default();

    for game in &games {
        match game.outcome {
            Some(outcome) => match outcome.winner() {
                Some(Player::Red) => results.red_wins += 1,
                Some(Player::Blue) => results.blue_wins += 1,
                None => results.draws += 1,
            },
            None => results.unresolved += 1,
        }
    }

    let total_turns: usize = games.iter().map(|g| g.turns).sum();
    results.avg_turns = if games.is_empty() {
        0.0
    } else {
        total_turns as f32 / games.len() as f32
    };
    results.games = games;
    results
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

fn describe(outcome: Option<Outcome>) -> String {
    match outcome {
        Some(outcome) => outcome.to_string(),
        None => "unresolved".to_string(),
    }
}

fn percent(count: usize, total: usize) -> f32 {
    if total > 0 {
        count as f32 / total as f32 * 100.0
    } else {
        0.0
    }
}

fn print_text_results(results: &SeriesResults, show_log: bool) {
    let total = results.games.len();

    println!("\n=== Selfplay Results ===");
    println!("Total games: {}", total);
    println!("Red wins:    {} ({:.1}%)", results.red_wins, percent(results.red_wins, total));
    println!("Blue wins:   {} ({:.1}%)", results.blue_wins, percent(results.blue_wins, total));
    println!("Draws:       {} ({:.1}%)", results.draws, percent(results.draws, total));
    println!("Unresolved:  {}", results.unresolved);
    println!("Avg turns:   {:.1}", results.avg_turns);

    println!("\nGame details:");
    for game in &results.games {
        println!(
            "  Game {} (seed {}): {} in {} turns",
            game.game_number,
            game.seed,
            describe(game.outcome),
            game.turns
        );
        if show_log {
            for line in game.log.lines() {
                println!("    {}", line);
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
