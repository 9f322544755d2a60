//! Moves and the move token grammar
//!
//! Tokens used in turn logs, position strings and over the wire:
//!
//! | move                | token       |
//! |---------------------|-------------|
//! | plain move          | `e2e3`      |
//! | move with capture   | `e2e3xf4`   |
//! | move and orient     | `c1c2↗`     |
//! | reinforce           | `Ia1`       |
//! | reinforce + capture | `Ia1xb2`    |
//! | free capture        | `xd5`       |
//! | bombard capture     | `@d5`       |
//! | skip                | `skip`      |

use crate::board::{Orientation, Square};
use crate::units::UnitKind;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// How an auto capture removes its target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CaptureKind {
    /// Target stands on a square bombarded by the mover
    Bombard,
    /// Target touches one of the mover's contact units
    Free,
}

/// A single action within a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Move {
    /// Deploy a reserve unit onto the home rank
    Reinforce {
        kind: UnitKind,
        to: Square,
        capture: Option<Square>,
    },
    /// Plain move of a non-artillery unit
    Advance {
        from: Square,
        to: Square,
        capture: Option<Square>,
    },
    /// Artillery repositioning; `to == from` turns in place
    MoveAndOrient {
        from: Square,
        to: Square,
        facing: Orientation,
    },
    AutoCapture {
        kind: CaptureKind,
        target: Square,
    },
    Skip,
}

impl Move {
    /// Square removed from the board by this move, if any
    pub fn captured_square(&self) -> Option<Square> {
        match *self {
            Move::Reinforce { capture, .. } | Move::Advance { capture, .. } => capture,
            Move::AutoCapture { target, .. } => Some(target),
            Move::MoveAndOrient { .. } | Move::Skip => None,
        }
    }

    /// Square a unit leaves, for moves that relocate one
    pub fn origin(&self) -> Option<Square> {
        match *self {
            Move::Advance { from, .. } | Move::MoveAndOrient { from, .. } => Some(from),
            _ => None,
        }
    }

    /// Square a unit arrives on
    pub fn destination(&self) -> Option<Square> {
        match *self {
            Move::Reinforce { to, .. }
            | Move::Advance { to, .. }
            | Move::MoveAndOrient { to, .. } => Some(to),
            _ => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Move::Skip)
    }
}

// ============================================================================
// TOKEN GRAMMAR
// ============================================================================

/// Errors from decoding a move token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedMove {
    #[error("empty move token")]
    Empty,

    #[error("invalid square in move token '{0}'")]
    BadSquare(String),

    #[error("unknown unit code '{code}' in move token '{token}'")]
    UnknownUnit { code: char, token: String },

    #[error("HQ cannot be deployed from reserve: '{0}'")]
    HqReinforce(String),

    #[error("unknown orientation glyph '{glyph}' in move token '{token}'")]
    BadOrientation { glyph: char, token: String },

    #[error("unexpected trailing text in move token '{0}'")]
    Trailing(String),
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Move::Reinforce { kind, to, capture } => {
                write!(f, "{}{}", kind.code(), to)?;
                write_capture(f, capture)
            }
            Move::Advance { from, to, capture } => {
                write!(f, "{}{}", from, to)?;
                write_capture(f, capture)
            }
            Move::MoveAndOrient { from, to, facing } => {
                write!(f, "{}{}{}", from, to, facing.glyph())
            }
            Move::AutoCapture { kind: CaptureKind::Free, target } => write!(f, "x{}", target),
            Move::AutoCapture { kind: CaptureKind::Bombard, target } => write!(f, "@{}", target),
            Move::Skip => f.write_str("skip"),
        }
    }
}

fn write_capture(f: &mut fmt::Formatter<'_>, capture: Option<Square>) -> fmt::Result {
    match capture {
        Some(target) => write!(f, "x{}", target),
        None => Ok(()),
    }
}

/// Split a leading two-character square off `s`
fn take_square<'a>(s: &'a str, token: &str) -> Result<(Square, &'a str), MalformedMove> {
    let head = s
        .get(..2)
        .ok_or_else(|| MalformedMove::BadSquare(token.to_string()))?;
    let sq = Square::parse(head).ok_or_else(|| MalformedMove::BadSquare(token.to_string()))?;
    Ok((sq, &s[2..]))
}

/// Parses the optional `x<square>` capture suffix
fn parse_capture(rest: &str, token: &str) -> Result<Option<Square>, MalformedMove> {
    if rest.is_empty() {
        return Ok(None);
    }
    let target = rest
        .strip_prefix('x')
        .ok_or_else(|| MalformedMove::Trailing(token.to_string()))?;
    let (sq, tail) = take_square(target, token)?;
    if !tail.is_empty() {
        return Err(MalformedMove::Trailing(token.to_string()));
    }
    Ok(Some(sq))
}

fn parse_target(rest: &str, token: &str) -> Result<Square, MalformedMove> {
    let (sq, tail) = take_square(rest, token)?;
    if !tail.is_empty() {
        return Err(MalformedMove::Trailing(token.to_string()));
    }
    Ok(sq)
}

impl FromStr for Move {
    type Err = MalformedMove;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let first = token.chars().next().ok_or(MalformedMove::Empty)?;

        if token == "skip" {
            return Ok(Move::Skip);
        }

        if let Some(rest) = token.strip_prefix('x') {
            let target = parse_target(rest, token)?;
            return Ok(Move::AutoCapture { kind: CaptureKind::Free, target });
        }

        if let Some(rest) = token.strip_prefix('@') {
            let target = parse_target(rest, token)?;
            return Ok(Move::AutoCapture { kind: CaptureKind::Bombard, target });
        }

        if first.is_ascii_uppercase() {
            let kind = UnitKind::from_code(first).ok_or_else(|| MalformedMove::UnknownUnit {
                code: first,
                token: token.to_string(),
            })?;
            if !kind.is_deployable() {
                return Err(MalformedMove::HqReinforce(token.to_string()));
            }
            let (to, rest) = take_square(&token[1..], token)?;
            let capture = parse_capture(rest, token)?;
            return Ok(Move::Reinforce { kind, to, capture });
        }

        let (from, rest) = take_square(token, token)?;
        let (to, rest) = take_square(rest, token)?;

        let mut tail = rest.chars();
        match (tail.next(), tail.next()) {
            (Some(glyph), None) if glyph != 'x' => {
                let facing = Orientation::from_glyph(glyph).ok_or_else(|| {
                    MalformedMove::BadOrientation {
                        glyph,
                        token: token.to_string(),
                    }
                })?;
                Ok(Move::MoveAndOrient { from, to, facing })
            }
            _ => {
                let capture = parse_capture(rest, token)?;
                Ok(Move::Advance { from, to, capture })
            }
        }
    }
}

impl Serialize for Move {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Move {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}
