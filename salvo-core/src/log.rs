//! Turn log codec
//!
//! One line per turn, in a PGN-like text form:
//!
//! ```text
//! 1. c2c3 d2d3 Ia1 {[%emt 12.250]}
//! 2. f7f6 skip {[%emt 3.000]}
//! 0-1 {[%sts resign]}
//! ```
//!
//! A terminal line carrying `resign` is a turn of its own; any other reason
//! annotates the turn line above it.

use crate::moves::{MalformedMove, Move};
use crate::position::MAX_MOVES_PER_TURN;
use crate::turn::{EndReason, Outcome, Turn};
use crate::units::Player;

/// Errors from parsing a turn log. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedTurnLog {
    #[error("line {line}: expected turn {expected}, found '{found}'")]
    BadTurnNumber { line: usize, expected: u32, found: String },

    #[error("line {line}: {source}")]
    BadMove { line: usize, source: MalformedMove },

    #[error("line {line}: more than {max} moves in one turn")]
    TooManyMoves { line: usize, max: usize },

    #[error("line {line}: unterminated or malformed comment")]
    BadComment { line: usize },

    #[error("line {line}: invalid elapsed time '{value}'")]
    BadElapsed { line: usize, value: String },

    #[error("line {line}: unknown end reason '{reason}'")]
    UnknownReason { line: usize, reason: String },

    #[error("line {line}: result line without a reason tag")]
    MissingReason { line: usize },

    #[error("line {line}: result '{result}' does not fit reason '{reason}'")]
    ResultMismatch { line: usize, result: String, reason: String },

    #[error("line {line}: result line has no turn to annotate")]
    OrphanResult { line: usize },

    #[error("line {line}: content after the game result")]
    AfterResult { line: usize },
}

const RESULT_TOKENS: [&str; 3] = ["1-0", "0-1", "1/2-1/2"];

// ============================================================================
// SERIALIZATION
// ============================================================================

/// Seconds with millisecond precision, `12.250`
fn format_elapsed(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

pub fn serialize(turns: &[Turn]) -> String {
    turns.iter().map(turn_lines).collect()
}

/// The line (or two, with a result) one turn occupies
fn turn_lines(turn: &Turn) -> String {
    if turn.resigned {
        let outcome = turn
            .outcome
            .unwrap_or(Outcome::Draw { reason: EndReason::Resign });
        let elapsed = if turn.elapsed_ms > 0 {
            format!(" {{[%emt {}]}}", format_elapsed(turn.elapsed_ms))
        } else {
            String::new()
        };
        return format!("{} {{[%sts resign]}}{}\n", outcome.result_token(), elapsed);
    }

    let mut lines = format!("{}.", turn.number);
    for mv in &turn.moves {
        lines.push(' ');
        lines.push_str(&mv.to_string());
    }
    lines.push_str(&format!(" {{[%emt {}]}}\n", format_elapsed(turn.elapsed_ms)));

    if let Some(outcome) = turn.outcome {
        lines.push_str(&format!(
            "{} {{[%sts {}]}}\n",
            outcome.result_token(),
            outcome.reason().token()
        ));
    }
    lines
}

// ============================================================================
// PARSING
// ============================================================================

/// Tags collected from the `{...}` comments of one line
#[derive(Default)]
struct Tags {
    elapsed_ms: Option<u64>,
    status: Option<String>,
}

fn parse_elapsed(value: &str, line: usize) -> Result<u64, MalformedTurnLog> {
    let bad = || MalformedTurnLog::BadElapsed { line, value: value.to_string() };

    let (secs, frac) = value.split_once('.').unwrap_or((value, ""));
    if secs.is_empty() || frac.len() > 3 {
        return Err(bad());
    }
    if !secs.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }

    let secs: u64 = secs.parse().map_err(|_| bad())?;
    let millis = format!("{:0<3}", frac).parse::<u64>().map_err(|_| bad())?;
    secs.checked_mul(1000)
        .and_then(|ms| ms.checked_add(millis))
        .ok_or_else(bad)
}

/// Parses zero or more `{[%tag value] ...}` comments
fn parse_comments(mut rest: &str, line: usize) -> Result<Tags, MalformedTurnLog> {
    let bad = || MalformedTurnLog::BadComment { line };
    let mut tags = Tags::default();

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(tags);
        }
        let body = rest.strip_prefix('{').ok_or_else(bad)?;
        let close = body.find('}').ok_or_else(bad)?;
        let (mut inner, tail) = (&body[..close], &body[close + 1..]);
        rest = tail;

        loop {
            inner = inner.trim_start();
            if inner.is_empty() {
                break;
            }
            let tag = inner.strip_prefix("[%").ok_or_else(bad)?;
            let end = tag.find(']').ok_or_else(bad)?;
            let (name, value) = tag[..end].trim().split_once(' ').ok_or_else(bad)?;
            let value = value.trim();
            match name {
                "emt" => tags.elapsed_ms = Some(parse_elapsed(value, line)?),
                "sts" => tags.status = Some(value.to_string()),
                _ => {}
            }
            inner = &tag[end + 1..];
        }
    }
}

fn parse_outcome(result: &str, tags: &Tags, line: usize) -> Result<Outcome, MalformedTurnLog> {
    let status = tags
        .status
        .as_deref()
        .ok_or(MalformedTurnLog::MissingReason { line })?;
    let reason = EndReason::from_token(status).ok_or_else(|| MalformedTurnLog::UnknownReason {
        line,
        reason: status.to_string(),
    })?;

    let outcome = match (result, reason.is_draw()) {
        ("1-0", false) => Outcome::win(Player::Red, reason),
        ("0-1", false) => Outcome::win(Player::Blue, reason),
        ("1/2-1/2", true) => Outcome::Draw { reason },
        _ => {
            return Err(MalformedTurnLog::ResultMismatch {
                line,
                result: result.to_string(),
                reason: status.to_string(),
            })
        }
    };
    Ok(outcome)
}

fn parse_turn_line(text: &str, expected: u32, line: usize) -> Result<Turn, MalformedTurnLog> {
    let bad_number = || MalformedTurnLog::BadTurnNumber {
        line,
        expected,
        found: text.split_whitespace().next().unwrap_or_default().to_string(),
    };

    let (number, rest) = text.split_once('.').ok_or_else(bad_number)?;
    let number: u32 = number.trim().parse().map_err(|_| bad_number())?;
    if number != expected {
        return Err(bad_number());
    }

    let (tokens, comments) = match rest.find('{') {
        Some(at) => rest.split_at(at),
        None => (rest, ""),
    };

    let moves = tokens
        .split_whitespace()
        .map(str::parse::<Move>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| MalformedTurnLog::BadMove { line, source })?;
    if moves.len() > MAX_MOVES_PER_TURN + 1 {
        return Err(MalformedTurnLog::TooManyMoves { line, max: MAX_MOVES_PER_TURN + 1 });
    }

    let tags = parse_comments(comments, line)?;
    if tags.status.is_some() {
        return Err(MalformedTurnLog::BadComment { line });
    }

    let mut turn = Turn::new(number, moves);
    turn.elapsed_ms = tags.elapsed_ms.unwrap_or(0);
    Ok(turn)
}

pub fn parse(text: &str) -> Result<Vec<Turn>, MalformedTurnLog> {
    let mut turns: Vec<Turn> = Vec::new();
    let mut finished = false;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw.trim();
        if content.is_empty() {
            continue;
        }
        if finished {
            return Err(MalformedTurnLog::AfterResult { line });
        }

        let result = RESULT_TOKENS.into_iter().find(|&token| {
            content
                .strip_prefix(token)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
        });

        let Some(result) = result else {
            let expected = turns.len() as u32 + 1;
            turns.push(parse_turn_line(content, expected, line)?);
            continue;
        };

        let tags = parse_comments(&content[result.len()..], line)?;
        let outcome = parse_outcome(result, &tags, line)?;
        finished = true;

        if outcome.reason() == EndReason::Resign {
            turns.push(Turn {
                number: turns.len() as u32 + 1,
                moves: Vec::new(),
                elapsed_ms: tags.elapsed_ms.unwrap_or(0),
                resigned: true,
                outcome: Some(outcome),
            });
        } else {
            let last = turns
                .last_mut()
                .ok_or(MalformedTurnLog::OrphanResult { line })?;
            last.outcome = Some(outcome);
        }
    }

    Ok(turns)
}
