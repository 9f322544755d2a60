//! Game clock derived from the turn log

use crate::turn::{side_for_turn, Turn};
use crate::units::Player;
use serde::{Deserialize, Serialize};

/// Initial budget plus per-turn increment. Zero initial time means untimed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeControl {
    pub initial_ms: u64,
    pub increment_ms: u64,
}

impl TimeControl {
    pub fn new(initial_ms: u64, increment_ms: u64) -> Self {
        Self { initial_ms, increment_ms }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn is_unlimited(&self) -> bool {
        self.initial_ms == 0
    }
}

/// Remaining time per side after a sequence of turns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clock {
    control: TimeControl,
    remaining: [i64; 2],
}

impl Clock {
    pub fn new(control: TimeControl) -> Self {
        let initial = control.initial_ms as i64;
        Self {
            control,
            remaining: [initial, initial],
        }
    }

    /// Replay elapsed times from a log; `first` owns turn 1.
    ///
    /// Each turn charges its owner; completed non-terminal turns earn the
    /// increment.
    pub fn from_turns(control: TimeControl, turns: &[Turn], first: Player) -> Self {
        let mut clock = Self::new(control);
        for turn in turns {
            let side = side_for_turn(turn.number, first);
            clock.charge(side, turn.elapsed_ms);
            if !turn.is_terminal() {
                clock.remaining[side.index()] += control.increment_ms as i64;
            }
        }
        clock
    }

    pub fn control(&self) -> TimeControl {
        self.control
    }

    pub fn charge(&mut self, player: Player, elapsed_ms: u64) {
        self.remaining[player.index()] -= elapsed_ms as i64;
    }

    /// Milliseconds left, `None` when untimed. Negative once flagged.
    pub fn remaining(&self, player: Player) -> Option<i64> {
        (!self.control.is_unlimited()).then_some(self.remaining[player.index()])
    }

    /// Whether `player` runs out after spending `pending_ms` more
    pub fn is_expired(&self, player: Player, pending_ms: u64) -> bool {
        self.remaining(player)
            .is_some_and(|left| left - (pending_ms as i64) <= 0)
    }
}
