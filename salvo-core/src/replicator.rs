//! Ordered, exactly-once turn delivery over an unreliable feed
//!
//! Frames may arrive duplicated, overlapping or out of order (a snapshot
//! racing live pushes, a reconnect replaying history). The replicator buffers
//! gaps and releases turns strictly in number order.

use crate::turn::Turn;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct TurnReplicator {
    /// Number of the next turn to deliver
    next: u32,
    pending: BTreeMap<u32, Turn>,
}

impl TurnReplicator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Resume after turns `1..next` were already delivered elsewhere
    pub fn starting_at(next: u32) -> Self {
        Self {
            next: next.max(1),
            pending: BTreeMap::new(),
        }
    }

    /// Feed a batch of turns; `deliver` fires once per newly contiguous turn.
    ///
    /// Returns how many turns were delivered.
    pub fn receive<I, F>(&mut self, turns: I, mut deliver: F) -> usize
    where
        I: IntoIterator<Item = Turn>,
        F: FnMut(Turn),
    {
        for turn in turns {
            if turn.number >= self.next {
                self.pending.entry(turn.number).or_insert(turn);
            }
        }

        let mut delivered = 0;
        while let Some(turn) = self.pending.remove(&self.next) {
            self.next += 1;
            delivered += 1;
            deliver(turn);
        }
        delivered
    }

    /// Next expected turn number, used as the resume cursor
    pub fn cursor(&self) -> u32 {
        self.next
    }

    /// Turns held back waiting for a gap to fill
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

impl Default for TurnReplicator {
    fn default() -> Self {
        Self::new()
    }
}
