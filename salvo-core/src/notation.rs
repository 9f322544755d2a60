//! Position string encoding and decoding.
//!
//! A compact single-line notation for a full position, in the spirit of FEN:
//!
//! ```text
//! <rank8>/<rank7>/.../<rank1> <red reserve> <blue reserve> <side> <turn moves>
//! ```
//!
//! - ranks run a..h; digits count empty squares; uppercase letters are Red,
//!   lowercase Blue; artillery letters carry an orientation glyph (`R↑`)
//! - reserves are code/count pairs (`I2A1`) or `-`
//! - side is `r` or `b`
//! - turn moves are comma-separated move tokens, or `-`

use crate::board::{Board, Orientation, Square, BOARD_SIZE};
use crate::moves::{MalformedMove, Move};
use crate::position::{Position, MAX_MOVES_PER_TURN};
use crate::units::{Piece, Player, Reserve, UnitKind};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur while decoding a position string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedPosition {
    #[error("expected 5 space-separated fields, got {0}")]
    WrongFieldCount(usize),

    #[error("expected 8 ranks separated by '/', got {0}")]
    WrongRankCount(usize),

    #[error("rank {rank} covers {files} files, expected 8")]
    WrongRankLength { rank: u8, files: usize },

    #[error("unknown unit code '{0}'")]
    UnknownUnit(char),

    #[error("artillery at {0} has no orientation glyph")]
    MissingOrientation(Square),

    #[error("invalid orientation glyph '{glyph}' after unit at {square}")]
    BadOrientation { square: Square, glyph: char },

    #[error("more than one HQ for {0}")]
    DuplicateHq(Player),

    #[error("invalid reserve entry '{0}'")]
    BadReserve(String),

    #[error("invalid side to move '{0}'")]
    BadSide(String),

    #[error("invalid turn move: {0}")]
    BadMove(#[from] MalformedMove),

    #[error("{0} moves in the open turn, at most 2 allowed")]
    TooManyTurnMoves(usize),
}

// ============================================================================
// ENCODING
// ============================================================================

/// Encode a position as a position string
pub fn encode(position: &Position) -> String {
    position.to_string()
}

fn write_rank(f: &mut fmt::Formatter<'_>, board: &Board, rank: u8) -> fmt::Result {
    let mut empty = 0;
    for file in 0..BOARD_SIZE {
        match board.get(Square::new(file, rank)) {
            None => empty += 1,
            Some(piece) => {
                if empty > 0 {
                    write!(f, "{}", empty)?;
                    empty = 0;
                }
                write!(f, "{}", piece.letter())?;
                if let Some(facing) = piece.facing {
                    write!(f, "{}", facing.glyph())?;
                }
            }
        }
    }
    if empty > 0 {
        write!(f, "{}", empty)?;
    }
    Ok(())
}

fn write_reserve(f: &mut fmt::Formatter<'_>, reserve: &Reserve) -> fmt::Result {
    if reserve.is_empty() {
        return f.write_str("-");
    }
    for (kind, count) in reserve.iter() {
        write!(f, "{}{}", kind.code(), count)?;
    }
    Ok(())
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..BOARD_SIZE).rev() {
            write_rank(f, self.board(), rank)?;
            if rank > 0 {
                f.write_str("/")?;
            }
        }

        f.write_str(" ")?;
        write_reserve(f, self.reserve(Player::Red))?;
        f.write_str(" ")?;
        write_reserve(f, self.reserve(Player::Blue))?;

        let side = match self.side_to_move() {
            Player::Red => "r",
            Player::Blue => "b",
        };
        write!(f, " {} ", side)?;

        if self.turn_moves().is_empty() {
            return f.write_str("-");
        }
        for (i, mv) in self.turn_moves().iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", mv)?;
        }
        Ok(())
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Decode a position string
pub fn decode(s: &str) -> Result<Position, MalformedPosition> {
    s.parse()
}

/// Parses one rank into `board`; `rank` is zero-based
fn parse_rank(s: &str, rank: u8, board: &mut Board) -> Result<(), MalformedPosition> {
    let mut file: usize = 0;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(run) = c.to_digit(10) {
            if run == 0 {
                return Err(MalformedPosition::WrongRankLength { rank: rank + 1, files: file });
            }
            file += run as usize;
            continue;
        }

        let kind = UnitKind::from_code(c)
            .filter(|_| c.is_ascii_alphabetic())
            .ok_or(MalformedPosition::UnknownUnit(c))?;
        let owner = if c.is_ascii_uppercase() { Player::Red } else { Player::Blue };

        if file >= BOARD_SIZE as usize {
            return Err(MalformedPosition::WrongRankLength { rank: rank + 1, files: file + 1 });
        }
        let square = Square::new(file as u8, rank);

        let piece = if kind.is_artillery() {
            let glyph = chars
                .next()
                .ok_or(MalformedPosition::MissingOrientation(square))?;
            let facing = Orientation::from_glyph(glyph)
                .ok_or(MalformedPosition::BadOrientation { square, glyph })?;
            Piece::oriented(kind, owner, facing)
        } else {
            if let Some(&glyph) = chars.peek() {
                if !glyph.is_ascii_alphanumeric() {
                    return Err(MalformedPosition::BadOrientation { square, glyph });
                }
            }
            Piece::new(kind, owner)
        };

        board.put(square, piece);
        file += 1;
    }

    if file != BOARD_SIZE as usize {
        return Err(MalformedPosition::WrongRankLength { rank: rank + 1, files: file });
    }
    Ok(())
}

/// Parses a reserve field (`I2A1` or `-`)
fn parse_reserve(s: &str) -> Result<Reserve, MalformedPosition> {
    let mut reserve = Reserve::empty();
    if s == "-" {
        return Ok(reserve);
    }

    let bad = || MalformedPosition::BadReserve(s.to_string());
    let mut chars = s.chars().peekable();
    while let Some(code) = chars.next() {
        let kind = UnitKind::from_code(code)
            .filter(|kind| code.is_ascii_uppercase() && kind.is_deployable())
            .ok_or_else(bad)?;

        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        let count: u8 = digits.parse().map_err(|_| bad())?;
        reserve.set(kind, count);
    }
    Ok(reserve)
}

fn parse_side(s: &str) -> Result<Player, MalformedPosition> {
    match s {
        "r" => Ok(Player::Red),
        "b" => Ok(Player::Blue),
        other => Err(MalformedPosition::BadSide(other.to_string())),
    }
}

fn parse_turn_moves(s: &str) -> Result<Vec<Move>, MalformedPosition> {
    if s == "-" {
        return Ok(Vec::new());
    }
    let moves = s
        .split(',')
        .map(str::parse)
        .collect::<Result<Vec<Move>, _>>()?;
    if moves.len() >= MAX_MOVES_PER_TURN {
        return Err(MalformedPosition::TooManyTurnMoves(moves.len()));
    }
    Ok(moves)
}

impl FromStr for Position {
    type Err = MalformedPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(MalformedPosition::WrongFieldCount(fields.len()));
        }

        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != BOARD_SIZE as usize {
            return Err(MalformedPosition::WrongRankCount(ranks.len()));
        }

        let mut board = Board::empty();
        for (i, rank_str) in ranks.iter().enumerate() {
            let rank = BOARD_SIZE - 1 - i as u8;
            parse_rank(rank_str, rank, &mut board)?;
        }

        for player in Player::BOTH {
            let hqs = board
                .pieces_of(player)
                .filter(|(_, piece)| piece.kind == UnitKind::Hq)
                .count();
            if hqs > 1 {
                return Err(MalformedPosition::DuplicateHq(player));
            }
        }

        let red = parse_reserve(fields[1])?;
        let blue = parse_reserve(fields[2])?;
        let side = parse_side(fields[3])?;
        let turn_moves = parse_turn_moves(fields[4])?;

        Ok(Position::new(board, red, blue, side).with_turn_moves(turn_moves))
    }
}
