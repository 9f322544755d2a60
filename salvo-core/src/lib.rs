//! SALVO Core - Rules engine and turn protocol
//!
//! This crate provides the core game logic for SALVO:
//! - Board geometry (8x8 grid, eight compass orientations)
//! - Unit types, reserves and positions
//! - Position strings and move tokens
//! - Bombardment tracing and legal move generation
//! - Turn composition, outcome detection and the turn log codec
//! - Ordered turn replication, clocks and input selection
//! - A greedy bot

pub mod board;
pub mod units;
pub mod moves;
pub mod position;
pub mod notation;
pub mod rules;
pub mod turn;
pub mod composer;
pub mod log;
pub mod replicator;
pub mod clock;
pub mod selection;
pub mod bot;

// Re-exports for convenient access
pub use board::{Board, Orientation, Square, SquareSet, BOARD_SIZE};
pub use units::{Piece, Player, Reserve, UnitKind, UNIT_STATS};
pub use moves::{CaptureKind, MalformedMove, Move};
pub use position::{Position, MAX_MOVES_PER_TURN, STANDARD_POSITION};
pub use notation::{decode, encode, MalformedPosition};
pub use rules::{bombarded_by, legal_moves, LegalityEngine, StandardRules};
pub use turn::{side_for_turn, EndReason, Outcome, Turn};
pub use composer::{GameError, Phase, TurnComposer};
pub use log::MalformedTurnLog;
pub use replicator::TurnReplicator;
pub use clock::{Clock, TimeControl};
pub use selection::{transition, Selection, SelectionEvent};
pub use bot::{play_turn, selfplay, Bot, GreedyBot};
