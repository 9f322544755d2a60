//! Computer opponent
//!
//! The bot plays through a [`TurnComposer`] like any other participant, so
//! it can only ever produce turns the rules accept.

use crate::composer::{GameError, TurnComposer};
use crate::moves::Move;
use crate::position::Position;
use crate::rules::LegalityEngine;
use crate::turn::Turn;
use crate::units::{Player, UnitKind};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Moves per turn before the greedy bot skips
const DEFAULT_MOVES_PER_TURN: usize = 2;

/// Something that picks a move from a legal list
pub trait Bot {
    fn choose(&mut self, position: &Position, legal: &[Move]) -> Move;
}

/// Takes the enemy HQ when it can, otherwise any capture, otherwise a random
/// move; skips once it has made `moves_per_turn` moves.
pub struct GreedyBot {
    pub moves_per_turn: usize,
    rng: ChaCha8Rng,
}

impl GreedyBot {
    pub fn new() -> Self {
        Self::with_seed(42)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            moves_per_turn: DEFAULT_MOVES_PER_TURN,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn moves_per_turn(mut self, moves: usize) -> Self {
        self.moves_per_turn = moves.max(1);
        self
    }
}

impl Default for GreedyBot {
    fn default() -> Self {
        Self::new()
    }
}

impl Bot for GreedyBot {
    fn choose(&mut self, position: &Position, legal: &[Move]) -> Move {
        if position.moves_made() >= self.moves_per_turn && legal.contains(&Move::Skip) {
            return Move::Skip;
        }

        let board = position.board();
        let captures: Vec<Move> = legal
            .iter()
            .copied()
            .filter(|mv| mv.captured_square().is_some())
            .collect();

        let hq_capture = captures.iter().copied().find(|mv| {
            mv.captured_square()
                .and_then(|sq| board.get(sq))
                .is_some_and(|piece| piece.kind == UnitKind::Hq)
        });
        if let Some(mv) = hq_capture {
            return mv;
        }

        if let Some(&mv) = captures.choose(&mut self.rng) {
            return mv;
        }

        let quiet: Vec<Move> = legal.iter().copied().filter(|mv| !mv.is_skip()).collect();
        quiet.choose(&mut self.rng).copied().unwrap_or(Move::Skip)
    }
}

/// Let `bot` play the composer's open turn to completion
pub fn play_turn<B, E>(bot: &mut B, composer: &mut TurnComposer<E>) -> Result<Turn, GameError>
where
    B: Bot + ?Sized,
    E: LegalityEngine,
{
    loop {
        if composer.is_finished() {
            return Err(GameError::GameOver);
        }
        let legal = composer.legal_moves();
        if legal.is_empty() {
            return Err(GameError::NoLegalMoves);
        }
        let mv = bot.choose(composer.position(), &legal);
        if let Some(turn) = composer.apply(mv)? {
            return Ok(turn);
        }
    }
}

/// Two bots play from `position` until the game ends or `max_turns` pass
pub fn selfplay(
    position: Position,
    red: &mut dyn Bot,
    blue: &mut dyn Bot,
    max_turns: u32,
) -> Result<TurnComposer, GameError> {
    let mut composer = TurnComposer::new(position);

    while !composer.is_finished() && composer.next_turn_number() <= max_turns {
        let turn = match composer.side_to_move() {
            Player::Red => play_turn(&mut *red, &mut composer)?,
            Player::Blue => play_turn(&mut *blue, &mut composer)?,
        };
        debug!("selfplay turn {}: {} moves", turn.number, turn.moves.len());
    }

    Ok(composer)
}
