//! Position: board, reserves, side to move and the open turn

use crate::board::{Board, Square};
use crate::moves::Move;
use crate::units::{Piece, Player, Reserve, UnitKind};

/// Maximum number of actions in one turn
pub const MAX_MOVES_PER_TURN: usize = 3;

/// Standard starting position in position-string notation
pub const STANDARD_POSITION: &str =
    "2r↓1hr↓2/2iiii2/8/8/8/8/2IIII2/2R↑1HR↑2 I2A1P1S1V1 I2A1P1S1V1 r -";

/// The unit of legality evaluation.
///
/// A plain value: `clone()` copies the fixed-size board and the short list of
/// in-turn moves, so branches never alias.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    board: Board,
    reserves: [Reserve; 2],
    side_to_move: Player,
    turn_moves: Vec<Move>,
}

impl Position {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    /// Position at the start of a turn
    pub fn new(board: Board, red: Reserve, blue: Reserve, side_to_move: Player) -> Self {
        Self {
            board,
            reserves: [red, blue],
            side_to_move,
            turn_moves: Vec::new(),
        }
    }

    /// Same position with moves already made in the open turn
    pub fn with_turn_moves(mut self, moves: Vec<Move>) -> Self {
        self.turn_moves = moves;
        self
    }

    /// Standard opening setup
    pub fn standard() -> Self {
        let mut board = Board::empty();
        let fleet = Reserve::from_counts(&[
            (UnitKind::Infantry, 2),
            (UnitKind::ArmoredInfantry, 1),
            (UnitKind::Airborne, 1),
            (UnitKind::ArmoredArtillery, 1),
            (UnitKind::HeavyArtillery, 1),
        ]);

        for player in Player::BOTH {
            let home = player.home_rank();
            let front = match player {
                Player::Red => home + 1,
                Player::Blue => home - 1,
            };
            board.put(Square::new(2, home), Piece::new(UnitKind::Artillery, player));
            board.put(Square::new(4, home), Piece::new(UnitKind::Hq, player));
            board.put(Square::new(5, home), Piece::new(UnitKind::Artillery, player));
            for file in 2..6 {
                board.put(Square::new(file, front), Piece::new(UnitKind::Infantry, player));
            }
        }

        Self::new(board, fleet, fleet, Player::Red)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn reserve(&self, player: Player) -> &Reserve {
        &self.reserves[player.index()]
    }

    pub fn side_to_move(&self) -> Player {
        self.side_to_move
    }

    /// Moves already made in the open turn
    pub fn turn_moves(&self) -> &[Move] {
        &self.turn_moves
    }

    pub fn moves_made(&self) -> usize {
        self.turn_moves.len()
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Apply a move without checking legality.
    ///
    /// Returns the captured piece, if any. `Skip` leaves the position untouched;
    /// closing the turn is the caller's job (see [`Position::end_turn`]).
    pub fn apply(&mut self, mv: &Move) -> Option<Piece> {
        let side = self.side_to_move;
        let captured = match *mv {
            Move::Skip => return None,

            Move::Reinforce { kind, to, capture } => {
                self.reserves[side.index()].take(kind);
                self.board.put(to, Piece::new(kind, side));
                capture.and_then(|target| self.board.remove(target))
            }

            Move::Advance { from, to, capture } => {
                if let Some(piece) = self.board.remove(from) {
                    self.board.put(to, piece);
                }
                capture.and_then(|target| self.board.remove(target))
            }

            Move::MoveAndOrient { from, to, facing } => {
                if let Some(piece) = self.board.remove(from) {
                    self.board.put(to, Piece::oriented(piece.kind, piece.owner, facing));
                }
                None
            }

            Move::AutoCapture { target, .. } => self.board.remove(target),
        };

        self.turn_moves.push(*mv);
        captured
    }

    /// Close the open turn and hand the move to the opponent
    pub fn end_turn(&mut self) {
        self.turn_moves.clear();
        self.side_to_move = self.side_to_move.opponent();
    }

    /// Player whose HQ has left the board, if any
    pub fn missing_hq(&self) -> Option<Player> {
        Player::BOTH
            .into_iter()
            .find(|&player| self.board.hq(player).is_none())
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::standard()
    }
}
