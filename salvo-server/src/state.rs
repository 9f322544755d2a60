//! Server state management
//!
//! Shared match store plus the bot seats the server plays itself.

use crate::store::{MatchId, MatchStore, Receipt, StoreError, Submission};
use crate::subscriber::{follow, Backoff, StreamError};
use salvo_core::{play_turn, GreedyBot, Player, TurnComposer, TurnReplicator};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Server-wide shared state
pub struct ServerState {
    pub store: Arc<MatchStore>,
    pub backoff: Backoff,
}

impl ServerState {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MatchStore::new()), Backoff::default())
    }

    pub fn with_store(store: Arc<MatchStore>, backoff: Backoff) -> Self {
        Self { store, backoff }
    }

    /// Put a bot in `seat` of match `id`; it plays until the game ends
    pub fn spawn_bot(&self, id: MatchId, seat: Player, secret: String, seed: u64) {
        let store = Arc::clone(&self.store);
        let backoff = self.backoff;
        tokio::spawn(async move {
            match drive_bot(store, id, seat, secret, seed, backoff).await {
                Ok(()) => info!("Bot for match {} done", id),
                Err(err) => warn!("Bot for match {} stopped: {}", id, err),
            }
        });
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Follow a match and answer every turn that belongs to `seat`.
///
/// The bot goes through `submit_turn` with the seat's secret, the same path
/// as a remote player.
pub async fn drive_bot(
    store: Arc<MatchStore>,
    id: MatchId,
    seat: Player,
    secret: String,
    seed: u64,
    backoff: Backoff,
) -> Result<(), StreamError> {
    let disconnected = |err: String| StreamError::Disconnected { attempts: 0, reason: err };

    let record = store.record(id).map_err(|e| disconnected(e.to_string()))?;
    let start = record.start().map_err(|e| disconnected(e.to_string()))?;
    let mut composer = TurnComposer::new(start);
    let mut bot = GreedyBot::with_seed(seed);

    let mut act = |composer: &TurnComposer| {
        if composer.is_finished() || composer.side_to_move() != seat {
            return;
        }
        // play on a scratch copy; the real composer only sees committed turns
        let mut scratch = composer.clone();
        let turn = match play_turn(&mut bot, &mut scratch) {
            Ok(turn) => turn,
            Err(err) => {
                warn!("Bot could not move in match {}: {}", id, err);
                return;
            }
        };
        let submission = Submission { player: seat, secret: secret.clone(), turn };
        if !settle(id, store.submit_turn(id, submission)) {
            debug!("Bot in match {} sits out until the next committed turn", id);
        }
    };

    act(&composer);
    if composer.is_finished() {
        return Ok(());
    }

    let mut replicator = TurnReplicator::new();
    follow(&*store, id, &mut replicator, &backoff, |turn| {
        if let Err(err) = composer.replay(&turn) {
            warn!("Bot lost sync with match {}: {}", id, err);
            return;
        }
        act(&composer);
    })
    .await
}

/// Log how a bot submission ended. True when the bot has nothing to redo:
/// its turn landed, or another commit got there first and the bot will see
/// it on the feed.
fn settle(id: MatchId, result: Result<Receipt, StoreError>) -> bool {
    match result {
        Ok(receipt) => {
            debug!("Bot played turn {} in match {}", receipt.turn.number, id);
            true
        }
        Err(StoreError::ConcurrentModification) => {
            info!("Bot turn in match {} lost a commit race, waiting for the winner", id);
            true
        }
        Err(StoreError::TurnOutOfSequence { expected, got }) => {
            info!("Bot turn {} in match {} is stale, match is at {}", got, id, expected);
            true
        }
        Err(err) => {
            warn!("Bot turn in match {} rejected: {}", id, err);
            false
        }
    }
}
