//! Geometry and legality engine
//!
//! Everything here is a pure function of a [`Position`]: bombardment lines,
//! the zone of control they project, and the full legal move set.

use crate::board::{Board, Orientation, Square, SquareSet};
use crate::moves::{CaptureKind, Move};
use crate::notation::MalformedPosition;
use crate::position::{Position, MAX_MOVES_PER_TURN};
use crate::units::{Piece, Player};

// ============================================================================
// ENGINE SEAM
// ============================================================================

/// A legality engine: position in, legal moves out.
///
/// The string-boundary method lets an engine be driven purely through
/// position strings and move tokens.
pub trait LegalityEngine {
    fn legal_moves(&self, position: &Position) -> Vec<Move>;

    fn legal_move_tokens(&self, position: &str) -> Result<Vec<String>, MalformedPosition> {
        let position: Position = position.parse()?;
        Ok(self
            .legal_moves(&position)
            .iter()
            .map(Move::to_string)
            .collect())
    }
}

/// The native rules implementation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StandardRules;

impl LegalityEngine for StandardRules {
    fn legal_moves(&self, position: &Position) -> Vec<Move> {
        legal_moves(position)
    }
}

// ============================================================================
// BOMBARDMENT
// ============================================================================

/// Squares on the firing line of the artillery piece at `from`.
///
/// Walks up to `range` steps along the facing, stopping at the edge.
/// Squares holding a friendly piece are skipped but do not stop the line.
pub fn firing_line(board: &Board, from: Square, piece: Piece) -> SquareSet {
    let (Some(range), Some(facing)) = (piece.kind.range(), piece.facing) else {
        return SquareSet::EMPTY;
    };

    let mut line = SquareSet::EMPTY;
    let mut current = from;
    for _ in 0..range {
        current = match current.step(facing) {
            Some(next) => next,
            None => break,
        };
        let friendly = board.get(current).is_some_and(|p| p.owner == piece.owner);
        if !friendly {
            line.insert(current);
        }
    }
    line
}

/// Every square bombarded by `player`'s artillery
pub fn bombarded_by(board: &Board, player: Player) -> SquareSet {
    board
        .pieces_of(player)
        .filter(|(_, piece)| piece.kind.is_artillery())
        .fold(SquareSet::EMPTY, |acc, (sq, piece)| {
            acc.union(firing_line(board, sq, piece))
        })
}

/// Zone of control: squares the side to move may not enter
pub fn denied_squares(position: &Position) -> SquareSet {
    bombarded_by(position.board(), position.side_to_move().opponent())
}

// ============================================================================
// MOVE GENERATION
// ============================================================================

/// Generate all legal moves for the side to move.
///
/// Sorted and free of duplicates, so the result can be compared as a set.
/// Empty when the side cannot act.
pub fn legal_moves(position: &Position) -> Vec<Move> {
    if position.moves_made() >= MAX_MOVES_PER_TURN {
        return vec![Move::Skip];
    }

    let board = position.board();
    let side = position.side_to_move();
    let denied = denied_squares(position);
    let mut moves = Vec::new();

    for (sq, piece) in board.pieces_of(side) {
        if piece.kind.is_artillery() {
            generate_artillery_moves(board, sq, piece, denied, &mut moves);
        } else {
            generate_unit_moves(board, sq, piece, denied, &mut moves);
        }
    }

    generate_reinforcements(position, denied, &mut moves);
    generate_auto_captures(board, side, &mut moves);

    if position.moves_made() > 0 {
        moves.push(Move::Skip);
    }

    moves.sort_unstable();
    moves.dedup();
    moves
}

/// Squares reached by stepping up to `mobility` squares in each direction.
///
/// The first occupied or (for non-parachutists) denied step ends the ray.
fn walk_destinations(board: &Board, from: Square, piece: Piece, denied: SquareSet) -> SquareSet {
    let ignores_denial = piece.kind.can_parachute();
    let mut dests = SquareSet::EMPTY;

    for dir in Orientation::ALL {
        let mut current = from;
        for _ in 0..piece.kind.mobility() {
            current = match current.step(dir) {
                Some(next) => next,
                None => break,
            };
            if !board.is_empty(current) {
                break;
            }
            if denied.contains(current) && !ignores_denial {
                break;
            }
            dests.insert(current);
        }
    }

    dests
}

/// Enemy squares touching `landing`, as seen by `player`
fn contact_targets(board: &Board, landing: Square, player: Player) -> impl Iterator<Item = Square> + '_ {
    landing
        .neighbors()
        .filter(move |&n| board.is_enemy(n, player))
}

fn generate_unit_moves(
    board: &Board,
    from: Square,
    piece: Piece,
    denied: SquareSet,
    moves: &mut Vec<Move>,
) {
    let mut dests = walk_destinations(board, from, piece, denied);

    // Parachute drop from the home rank
    if piece.kind.can_parachute() && from.rank() == piece.owner.home_rank() {
        let drops = Square::all()
            .filter(|&sq| sq != from && board.is_empty(sq) && !denied.contains(sq));
        dests = dests.union(drops.collect());
    }

    for to in dests.iter() {
        moves.push(Move::Advance { from, to, capture: None });
        if piece.kind.can_contact() {
            for target in contact_targets(board, to, piece.owner) {
                moves.push(Move::Advance { from, to, capture: Some(target) });
            }
        }
    }
}

fn generate_artillery_moves(
    board: &Board,
    from: Square,
    piece: Piece,
    denied: SquareSet,
    moves: &mut Vec<Move>,
) {
    let mut dests = walk_destinations(board, from, piece, denied);
    dests.insert(from);

    for to in dests.iter() {
        for facing in Orientation::ALL {
            if to == from && Some(facing) == piece.facing {
                continue;
            }
            moves.push(Move::MoveAndOrient { from, to, facing });
        }
    }
}

fn generate_reinforcements(position: &Position, denied: SquareSet, moves: &mut Vec<Move>) {
    let board = position.board();
    let side = position.side_to_move();
    let reserve = position.reserve(side);
    let home = side.home_rank();

    let landings: Vec<Square> = (0..8)
        .map(|file| Square::new(file, home))
        .filter(|&sq| board.is_empty(sq) && !denied.contains(sq))
        .collect();

    for (kind, _) in reserve.iter() {
        for &to in &landings {
            moves.push(Move::Reinforce { kind, to, capture: None });
            if kind.can_contact() {
                for target in contact_targets(board, to, side) {
                    moves.push(Move::Reinforce { kind, to, capture: Some(target) });
                }
            }
        }
    }
}

fn generate_auto_captures(board: &Board, side: Player, moves: &mut Vec<Move>) {
    let fire = bombarded_by(board, side);

    for (target, _) in board.pieces_of(side.opponent()) {
        if fire.contains(target) {
            moves.push(Move::AutoCapture { kind: CaptureKind::Bombard, target });
        }
        let in_contact = target.neighbors().any(|n| {
            board
                .get(n)
                .is_some_and(|p| p.owner == side && p.kind.can_contact())
        });
        if in_contact {
            moves.push(Move::AutoCapture { kind: CaptureKind::Free, target });
        }
    }
}
