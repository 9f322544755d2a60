//! Follow a match's turn stream with reconnects
//!
//! Subscribes before snapshotting so nothing committed in between is missed;
//! the replicator drops whatever arrives twice.

use crate::store::{MatchId, MatchStore, MatchBackend, StoreError, TurnFrame};
use salvo_core::{LegalityEngine, Turn, TurnReplicator};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("stream disconnected after {attempts} attempts: {reason}")]
    Disconnected { attempts: u32, reason: String },
}

/// Exponential reconnect delays
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub cap: Duration,
    pub max_retries: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            cap: Duration::from_secs(8),
            max_retries: 6,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.cap)
    }
}

/// Where turns come from: a full snapshot plus a live feed
pub trait TurnSource {
    fn snapshot(&self, id: MatchId) -> Result<Vec<Turn>, StoreError>;
    fn subscribe(&self, id: MatchId) -> Result<broadcast::Receiver<TurnFrame>, StoreError>;
}

impl<B: MatchBackend, E: LegalityEngine + Clone> TurnSource for MatchStore<B, E> {
    fn snapshot(&self, id: MatchId) -> Result<Vec<Turn>, StoreError> {
        MatchStore::snapshot(self, id).map(|snapshot| snapshot.turns)
    }

    fn subscribe(&self, id: MatchId) -> Result<broadcast::Receiver<TurnFrame>, StoreError> {
        MatchStore::subscribe(self, id)
    }
}

/// Push turns through the replicator; true once a terminal turn went out
fn feed<F: FnMut(Turn)>(replicator: &mut TurnReplicator, turns: Vec<Turn>, deliver: &mut F) -> bool {
    let mut finished = false;
    replicator.receive(turns, |turn| {
        finished |= turn.is_terminal();
        deliver(turn);
    });
    finished
}

/// Deliver every turn of match `id` in order, exactly once, until the game
/// ends. Reconnects with `backoff` when the feed closes or fails.
pub async fn follow<S, F>(
    source: &S,
    id: MatchId,
    replicator: &mut TurnReplicator,
    backoff: &Backoff,
    mut deliver: F,
) -> Result<(), StreamError>
where
    S: TurnSource + ?Sized,
    F: FnMut(Turn),
{
    let mut failures: u32 = 0;

    loop {
        let connected = source
            .subscribe(id)
            .and_then(|rx| source.snapshot(id).map(|turns| (rx, turns)));

        let reason = match connected {
            Ok((mut rx, turns)) => {
                failures = 0;
                if feed(replicator, turns, &mut deliver) {
                    return Ok(());
                }

                loop {
                    match rx.recv().await {
                        Ok(frame) => {
                            if feed(replicator, frame.turns, &mut deliver) {
                                return Ok(());
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            debug!("Match {} feed lagged by {} frames, resyncing", id, skipped);
                            break None;
                        }
                        Err(RecvError::Closed) => break Some("feed closed".to_string()),
                    }
                }
            }
            Err(err) => Some(err.to_string()),
        };

        let Some(reason) = reason else {
            continue;
        };

        if failures >= backoff.max_retries {
            return Err(StreamError::Disconnected { attempts: failures + 1, reason });
        }
        let delay = backoff.delay(failures);
        failures += 1;
        warn!("Match {} stream lost ({}), retrying in {:?}", id, reason, delay);
        tokio::time::sleep(delay).await;
    }
}
