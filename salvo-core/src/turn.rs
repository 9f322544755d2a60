//! Turns and game outcomes

use crate::moves::Move;
use crate::units::Player;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a game ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    Resign,
    Timeout,
    HqCapture,
    Trapped,
    DoubleSkip,
}

impl EndReason {
    pub const ALL: [EndReason; 5] = [
        EndReason::Resign,
        EndReason::Timeout,
        EndReason::HqCapture,
        EndReason::Trapped,
        EndReason::DoubleSkip,
    ];

    /// Tag value used in turn logs
    pub fn token(self) -> &'static str {
        match self {
            EndReason::Resign => "resign",
            EndReason::Timeout => "timeout",
            EndReason::HqCapture => "hq-capture",
            EndReason::Trapped => "trapped",
            EndReason::DoubleSkip => "double-skip",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.token() == token)
    }

    /// Only a double skip ends the game without a winner
    pub fn is_draw(self) -> bool {
        self == EndReason::DoubleSkip
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EndReason::Resign => "by resignation",
            EndReason::Timeout => "on time",
            EndReason::HqCapture => "by HQ capture",
            EndReason::Trapped => "trapping HQ",
            EndReason::DoubleSkip => "by double skip",
        };
        f.write_str(text)
    }
}

/// Final result of a game
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outcome {
    Win { winner: Player, reason: EndReason },
    Draw { reason: EndReason },
}

impl Outcome {
    pub fn win(winner: Player, reason: EndReason) -> Self {
        Outcome::Win { winner, reason }
    }

    pub fn reason(self) -> EndReason {
        match self {
            Outcome::Win { reason, .. } | Outcome::Draw { reason } => reason,
        }
    }

    pub fn winner(self) -> Option<Player> {
        match self {
            Outcome::Win { winner, .. } => Some(winner),
            Outcome::Draw { .. } => None,
        }
    }

    /// `1-0`, `0-1` or `1/2-1/2`; Red is the first-named side
    pub fn result_token(self) -> &'static str {
        match self.winner() {
            Some(Player::Red) => "1-0",
            Some(Player::Blue) => "0-1",
            None => "1/2-1/2",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win { winner, reason } => write!(f, "{} wins {}", winner, reason),
            Outcome::Draw { reason } => write!(f, "draw {}", reason),
        }
    }
}

/// One entry of the turn log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// 1-based, strictly sequential
    pub number: u32,
    pub moves: Vec<Move>,
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default)]
    pub resigned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl Turn {
    pub fn new(number: u32, moves: Vec<Move>) -> Self {
        Self {
            number,
            moves,
            elapsed_ms: 0,
            resigned: false,
            outcome: None,
        }
    }

    /// Zero-move turn that only passes
    pub fn is_pass(&self) -> bool {
        !self.resigned && self.moves == [Move::Skip]
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Side that owns turn `number` when `first` moves in turn 1
pub fn side_for_turn(number: u32, first: Player) -> Player {
    if number % 2 == 1 {
        first
    } else {
        first.opponent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_tokens() {
        for reason in EndReason::ALL {
            assert_eq!(EndReason::from_token(reason.token()), Some(reason));
        }
        assert_eq!(EndReason::from_token("checkmate"), None);
        assert_eq!(EndReason::Timeout.to_string(), "on time");
    }

    #[test]
    fn test_result_tokens() {
        assert_eq!(Outcome::win(Player::Red, EndReason::Trapped).result_token(), "1-0");
        assert_eq!(Outcome::win(Player::Blue, EndReason::Resign).result_token(), "0-1");
        assert_eq!(Outcome::Draw { reason: EndReason::DoubleSkip }.result_token(), "1/2-1/2");
        assert_eq!(
            Outcome::win(Player::Blue, EndReason::Timeout).to_string(),
            "blue wins on time"
        );
    }

    #[test]
    fn test_turn_parity() {
        assert_eq!(side_for_turn(1, Player::Red), Player::Red);
        assert_eq!(side_for_turn(2, Player::Red), Player::Blue);
        assert_eq!(side_for_turn(7, Player::Blue), Player::Blue);
    }

    #[test]
    fn test_turn_json_shape() {
        let mut turn = Turn::new(3, vec!["e2e3".parse().unwrap(), Move::Skip]);
        turn.elapsed_ms = 1500;
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["moves"], serde_json::json!(["e2e3", "skip"]));
        assert!(json.get("outcome").is_none());

        let back: Turn =
            serde_json::from_str(r#"{"number":1,"moves":["skip"]}"#).unwrap();
        assert!(back.is_pass());
    }
}
