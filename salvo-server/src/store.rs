//! Match store with optimistic concurrency
//!
//! A match's turn log is its only mutable field. Every write reads a
//! snapshot of the log, validates the submission against a replay of it, and
//! lands with a compare-and-swap on the log text. Losers of a race get
//! [`StoreError::ConcurrentModification`] and nothing is merged.

use crate::auth::{generate_secret, verify_secret};
use rustc_hash::FxHashMap;
use salvo_core::log::{self, MalformedTurnLog};
use salvo_core::{
    Clock, GameError, LegalityEngine, MalformedPosition, Outcome, Player, Position, StandardRules,
    TimeControl, Turn, TurnComposer,
};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type MatchId = Uuid;

/// Default per-match broadcast buffer
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("match {0} not found")]
    NotFound(MatchId),

    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error("turn log is malformed: {0}")]
    Log(#[from] MalformedTurnLog),

    #[error("invalid start position: {0}")]
    Position(#[from] MalformedPosition),

    #[error("match was modified concurrently")]
    ConcurrentModification,

    #[error("match is finished")]
    MatchFinished,

    #[error("expected turn {expected}, got {got}")]
    TurnOutOfSequence { expected: u32, got: u32 },
}

/// Parameters for a new match
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MatchSpec {
    pub red: String,
    pub blue: String,
    #[serde(default)]
    pub rated: bool,
    #[serde(flatten)]
    pub time_control: TimeControl,
    /// Start position string; standard setup when absent
    #[serde(default)]
    pub position: Option<String>,
}

/// Stored match. Everything but `log` is fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchRecord {
    pub id: MatchId,
    pub red: String,
    pub blue: String,
    pub red_hash: String,
    pub blue_hash: String,
    pub rated: bool,
    pub time_control: TimeControl,
    pub start_position: Option<String>,
    pub log: String,
    pub created_at_ms: u64,
}

impl MatchRecord {
    pub fn credential_hash(&self, player: Player) -> &str {
        match player {
            Player::Red => &self.red_hash,
            Player::Blue => &self.blue_hash,
        }
    }

    pub fn start(&self) -> Result<Position, MalformedPosition> {
        match &self.start_position {
            Some(position) => position.parse(),
            None => Ok(Position::standard()),
        }
    }
}

/// Seat secrets handed out once at creation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub red_secret: String,
    pub blue_secret: String,
}

impl Credentials {
    pub fn secret(&self, player: Player) -> &str {
        match player {
            Player::Red => &self.red_secret,
            Player::Blue => &self.blue_secret,
        }
    }
}

/// A client's proposed turn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
    pub player: Player,
    pub secret: String,
    pub turn: Turn,
}

/// Derived match status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MatchStatus {
    InProgress { side_to_move: Player, turn: u32 },
    Finished { outcome: Outcome },
}

/// Log text and its parsed turns, read together
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub log: String,
    pub turns: Vec<Turn>,
}

/// Push frame published on every commit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnFrame {
    pub turns: Vec<Turn>,
}

impl TurnFrame {
    pub fn is_terminal(&self) -> bool {
        self.turns.iter().any(Turn::is_terminal)
    }
}

/// A validated turn waiting for its compare-and-swap
#[derive(Clone, Debug)]
pub struct PreparedTurn {
    pub id: MatchId,
    pub expected_log: String,
    pub new_log: String,
    pub receipt: Receipt,
}

/// Authoritative result of a committed turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub turn: Turn,
    pub status: MatchStatus,
}

/// A match replayed up to its latest turn
pub struct Game<E = StandardRules> {
    pub record: MatchRecord,
    pub composer: TurnComposer<E>,
}

impl<E: LegalityEngine> Game<E> {
    pub fn status(&self) -> MatchStatus {
        status_of(&self.composer)
    }

    pub fn clock(&self) -> Clock {
        Clock::from_turns(
            self.record.time_control,
            self.composer.turns(),
            self.composer.first_player(),
        )
    }
}

fn status_of<E: LegalityEngine>(composer: &TurnComposer<E>) -> MatchStatus {
    match composer.outcome() {
        Some(outcome) => MatchStatus::Finished { outcome },
        None => MatchStatus::InProgress {
            side_to_move: composer.side_to_move(),
            turn: composer.next_turn_number(),
        },
    }
}

// ============================================================================
// BACKEND
// ============================================================================

/// Persistence seam. `compare_and_swap` replaces the log only when it still
/// equals `expected`.
pub trait MatchBackend: Send + Sync {
    fn insert(&self, record: MatchRecord);
    fn load(&self, id: MatchId) -> Option<MatchRecord>;
    fn compare_and_swap(&self, id: MatchId, expected: &str, new_log: String) -> Result<(), StoreError>;
}

/// In-memory backend
#[derive(Default)]
pub struct MemoryBackend {
    matches: RwLock<FxHashMap<MatchId, MatchRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchBackend for MemoryBackend {
    fn insert(&self, record: MatchRecord) {
        let mut matches = self.matches.write().unwrap_or_else(PoisonError::into_inner);
        matches.insert(record.id, record);
    }

    fn load(&self, id: MatchId) -> Option<MatchRecord> {
        let matches = self.matches.read().unwrap_or_else(PoisonError::into_inner);
        matches.get(&id).cloned()
    }

    fn compare_and_swap(&self, id: MatchId, expected: &str, new_log: String) -> Result<(), StoreError> {
        let mut matches = self.matches.write().unwrap_or_else(PoisonError::into_inner);
        let record = matches.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.log != expected {
            return Err(StoreError::ConcurrentModification);
        }
        record.log = new_log;
        Ok(())
    }
}

// ============================================================================
// STORE
// ============================================================================

pub struct MatchStore<B = MemoryBackend, E = StandardRules> {
    backend: B,
    engine: E,
    channels: Mutex<FxHashMap<MatchId, broadcast::Sender<TurnFrame>>>,
    capacity: usize,
}

impl MatchStore {
    pub fn new() -> Self {
        Self::with_backend(MemoryBackend::new(), StandardRules)
    }
}

impl Default for MatchStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: MatchBackend, E: LegalityEngine + Clone> MatchStore<B, E> {
    pub fn with_backend(backend: B, engine: E) -> Self {
        Self {
            backend,
            engine,
            channels: Mutex::new(FxHashMap::default()),
            capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Register a match; returns its id and the seat secrets
    pub fn create(&self, spec: MatchSpec) -> Result<(MatchId, Credentials), StoreError> {
        if let Some(position) = &spec.position {
            position.parse::<Position>()?;
        }

        let mut rng = rand::thread_rng();
        let (red_secret, red_hash) = generate_secret(&mut rng);
        let (blue_secret, blue_hash) = generate_secret(&mut rng);

        let id = Uuid::new_v4();
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        self.backend.insert(MatchRecord {
            id,
            red: spec.red,
            blue: spec.blue,
            red_hash,
            blue_hash,
            rated: spec.rated,
            time_control: spec.time_control,
            start_position: spec.position,
            log: String::new(),
            created_at_ms,
        });

        info!("Created match {}", id);
        Ok((id, Credentials { red_secret, blue_secret }))
    }

    pub fn record(&self, id: MatchId) -> Result<MatchRecord, StoreError> {
        self.backend.load(id).ok_or(StoreError::NotFound(id))
    }

    pub fn snapshot(&self, id: MatchId) -> Result<Snapshot, StoreError> {
        let record = self.record(id)?;
        let turns = log::parse(&record.log)?;
        Ok(Snapshot { log: record.log, turns })
    }

    /// Load and replay a match
    pub fn game(&self, id: MatchId) -> Result<Game<E>, StoreError> {
        let record = self.record(id)?;
        let turns = log::parse(&record.log)?;
        let composer = self.replay(&record, &turns)?;
        Ok(Game { record, composer })
    }

    pub fn status(&self, id: MatchId) -> Result<MatchStatus, StoreError> {
        Ok(self.game(id)?.status())
    }

    fn replay(&self, record: &MatchRecord, turns: &[Turn]) -> Result<TurnComposer<E>, StoreError> {
        let mut composer = TurnComposer::with_engine(record.start()?, self.engine.clone());
        for turn in turns {
            composer.replay(turn)?;
        }
        Ok(composer)
    }

    /// Validate a submission against the current log without writing
    pub fn prepare(&self, id: MatchId, submission: &Submission) -> Result<PreparedTurn, StoreError> {
        let record = self.record(id)?;

        if !verify_secret(&submission.secret, record.credential_hash(submission.player)) {
            return Err(StoreError::Unauthorized("bad credentials"));
        }

        let turns = log::parse(&record.log)?;
        let mut composer = self.replay(&record, &turns)?;
        if composer.is_finished() {
            return Err(StoreError::MatchFinished);
        }

        let proposed = &submission.turn;
        let expected = composer.next_turn_number();
        if proposed.number != expected {
            return Err(StoreError::TurnOutOfSequence { expected, got: proposed.number });
        }

        let player = submission.player;
        let clock = Clock::from_turns(record.time_control, &turns, composer.first_player());

        let mut turn = if proposed.resigned {
            composer.resign(player)?
        } else {
            if composer.side_for(expected) != player {
                return Err(StoreError::Unauthorized("not this player's turn"));
            }
            if clock.is_expired(player, proposed.elapsed_ms) {
                composer.timeout(player)?
            } else {
                composer.compose(&proposed.moves, proposed.elapsed_ms)?
            }
        };
        turn.elapsed_ms = proposed.elapsed_ms;

        let mut all = composer.turns().to_vec();
        if let Some(last) = all.last_mut() {
            last.elapsed_ms = proposed.elapsed_ms;
        }

        Ok(PreparedTurn {
            id,
            expected_log: record.log,
            new_log: log::serialize(&all),
            receipt: Receipt {
                turn,
                status: status_of(&composer),
            },
        })
    }

    /// Land a prepared turn if the log is still what it was validated against
    pub fn commit(&self, prepared: PreparedTurn) -> Result<Receipt, StoreError> {
        self.backend
            .compare_and_swap(prepared.id, &prepared.expected_log, prepared.new_log)?;

        let receipt = prepared.receipt;
        debug!("Committed turn {} to match {}", receipt.turn.number, prepared.id);
        if let Some(outcome) = receipt.turn.outcome {
            info!("Match {} finished: {}", prepared.id, outcome);
        }

        self.publish(prepared.id, TurnFrame { turns: vec![receipt.turn.clone()] });
        Ok(receipt)
    }

    pub fn submit_turn(&self, id: MatchId, submission: Submission) -> Result<Receipt, StoreError> {
        let result = self.prepare(id, &submission).and_then(|prepared| self.commit(prepared));
        if let Err(err) = &result {
            warn!(
                "Rejected turn {} from {} in match {}: {}",
                submission.turn.number, submission.player, id, err
            );
        }
        result
    }

    /// Timer hook: flag the side to move if `elapsed_ms` on the running
    /// turn exhausts its clock. Returns the timeout turn when one was written.
    pub fn expire(&self, id: MatchId, elapsed_ms: u64) -> Result<Option<Receipt>, StoreError> {
        let record = self.record(id)?;
        let turns = log::parse(&record.log)?;
        let mut composer = self.replay(&record, &turns)?;
        if composer.is_finished() {
            return Err(StoreError::MatchFinished);
        }

        let side = composer.side_to_move();
        let clock = Clock::from_turns(record.time_control, &turns, composer.first_player());
        if !clock.is_expired(side, elapsed_ms) {
            return Ok(None);
        }

        let mut turn = composer.timeout(side)?;
        turn.elapsed_ms = elapsed_ms;
        let mut all = composer.turns().to_vec();
        if let Some(last) = all.last_mut() {
            last.elapsed_ms = elapsed_ms;
        }

        let prepared = PreparedTurn {
            id,
            expected_log: record.log,
            new_log: log::serialize(&all),
            receipt: Receipt { turn, status: status_of(&composer) },
        };
        self.commit(prepared).map(Some)
    }

    /// Live feed of committed turns for one match
    ///
    /// A finished match gets an already-closed feed; its snapshot holds
    /// everything there is.
    pub fn subscribe(&self, id: MatchId) -> Result<broadcast::Receiver<TurnFrame>, StoreError> {
        // status is read under the channel lock so a concurrent final
        // commit cannot slip between the check and the insert
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if let MatchStatus::Finished { .. } = self.status(id)? {
            return Ok(broadcast::channel(1).1);
        }
        let sender = channels
            .entry(id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(sender.subscribe())
    }

    /// Send `frame` to live subscribers; the channel is dropped after the
    /// frame that ends the game
    fn publish(&self, id: MatchId, frame: TurnFrame) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let terminal = frame.is_terminal();
        if let Some(sender) = channels.get(&id) {
            if let Err(err) = sender.send(frame) {
                debug!("No live subscribers for match {}: {} turns unsent", id, err.0.turns.len());
            }
        }
        if terminal {
            channels.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvo_core::{EndReason, Move};

    fn mv(token: &str) -> Move {
        token.parse().unwrap()
    }

    fn spec() -> MatchSpec {
        MatchSpec {
            red: "alice".to_string(),
            blue: "bob".to_string(),
            ..MatchSpec::default()
        }
    }

    fn submission(creds: &Credentials, player: Player, number: u32, moves: &[&str]) -> Submission {
        Submission {
            player,
            secret: creds.secret(player).to_string(),
            turn: Turn::new(number, moves.iter().map(|t| mv(t)).collect()),
        }
    }

    #[test]
    fn test_create_stores_only_hashes() {
        let store = MatchStore::new();
        let (id, creds) = store.create(spec()).unwrap();
        let record = store.record(id).unwrap();
        assert_ne!(record.red_hash, creds.red_secret);
        assert!(verify_secret(&creds.red_secret, &record.red_hash));
        assert!(record.log.is_empty());
        assert_eq!(
            store.status(id).unwrap(),
            MatchStatus::InProgress { side_to_move: Player::Red, turn: 1 }
        );
    }

    #[test]
    fn test_create_rejects_bad_position() {
        let store = MatchStore::new();
        let bad = MatchSpec { position: Some("nonsense".to_string()), ..spec() };
        assert!(matches!(store.create(bad), Err(StoreError::Position(_))));
    }

    #[test]
    fn test_submit_appends_to_log() {
        let store = MatchStore::new();
        let (id, creds) = store.create(spec()).unwrap();
        let receipt = store
            .submit_turn(id, submission(&creds, Player::Red, 1, &["c2c3", "skip"]))
            .unwrap();
        assert_eq!(
            receipt.status,
            MatchStatus::InProgress { side_to_move: Player::Blue, turn: 2 }
        );
        let snapshot = store.snapshot(id).unwrap();
        assert_eq!(snapshot.log, "1. c2c3 skip {[%emt 0.000]}\n");
        assert_eq!(snapshot.turns, vec![receipt.turn]);
    }

    #[test]
    fn test_rejections_leave_log_untouched() {
        let store = MatchStore::new();
        let (id, creds) = store.create(spec()).unwrap();

        let mut forged = submission(&creds, Player::Red, 1, &["c2c3", "skip"]);
        forged.secret = creds.blue_secret.clone();
        assert_eq!(store.submit_turn(id, forged), Err(StoreError::Unauthorized("bad credentials")));

        let wrong_side = submission(&creds, Player::Blue, 1, &["c7c6", "skip"]);
        assert_eq!(
            store.submit_turn(id, wrong_side),
            Err(StoreError::Unauthorized("not this player's turn"))
        );

        let skipped_ahead = submission(&creds, Player::Red, 2, &["c2c3", "skip"]);
        assert_eq!(
            store.submit_turn(id, skipped_ahead),
            Err(StoreError::TurnOutOfSequence { expected: 1, got: 2 })
        );

        let illegal = submission(&creds, Player::Red, 1, &["c2c5"]);
        assert_eq!(
            store.submit_turn(id, illegal),
            Err(StoreError::Game(GameError::IllegalMove(mv("c2c5"))))
        );

        assert_eq!(store.record(id).unwrap().log, "");
    }

    #[test]
    fn test_resignation_out_of_turn() {
        let store = MatchStore::new();
        let (id, creds) = store.create(spec()).unwrap();
        let mut resign = submission(&creds, Player::Blue, 1, &[]);
        resign.turn.resigned = true;

        let receipt = store.submit_turn(id, resign).unwrap();
        let outcome = Outcome::win(Player::Red, EndReason::Resign);
        assert_eq!(receipt.status, MatchStatus::Finished { outcome });
        assert_eq!(store.record(id).unwrap().log, "1-0 {[%sts resign]}\n");

        let late = submission(&creds, Player::Red, 2, &["c2c3", "skip"]);
        assert_eq!(store.submit_turn(id, late), Err(StoreError::MatchFinished));
    }

    #[test]
    fn test_cas_race_has_one_winner() {
        let store = MatchStore::new();
        let (id, creds) = store.create(spec()).unwrap();

        let a = store.prepare(id, &submission(&creds, Player::Red, 1, &["c2c3", "skip"])).unwrap();
        let b = store.prepare(id, &submission(&creds, Player::Red, 1, &["d2d3", "skip"])).unwrap();

        assert!(store.commit(a).is_ok());
        assert_eq!(store.commit(b), Err(StoreError::ConcurrentModification));
        assert_eq!(store.snapshot(id).unwrap().turns.len(), 1);
    }

    #[test]
    fn test_clock_flags_late_submission() {
        let store = MatchStore::new();
        let timed = MatchSpec { time_control: TimeControl::new(1_000, 0), ..spec() };
        let (id, creds) = store.create(timed).unwrap();

        let mut slow = submission(&creds, Player::Red, 1, &["c2c3", "skip"]);
        slow.turn.elapsed_ms = 1_500;
        let receipt = store.submit_turn(id, slow).unwrap();
        assert_eq!(receipt.turn.outcome, Some(Outcome::win(Player::Blue, EndReason::Timeout)));
        assert!(receipt.turn.moves.is_empty());
        assert_eq!(receipt.turn.elapsed_ms, 1_500);
    }

    #[test]
    fn test_expire_hook() {
        let store = MatchStore::new();
        let timed = MatchSpec { time_control: TimeControl::new(5_000, 0), ..spec() };
        let (id, _) = store.create(timed).unwrap();

        assert_eq!(store.expire(id, 4_000), Ok(None));
        let receipt = store.expire(id, 5_000).unwrap().unwrap();
        assert_eq!(receipt.turn.outcome, Some(Outcome::win(Player::Blue, EndReason::Timeout)));
        assert_eq!(store.record(id).unwrap().log, "1. {[%emt 5.000]}\n0-1 {[%sts timeout]}\n");
        assert_eq!(store.expire(id, 9_000), Err(StoreError::MatchFinished));

        let untimed = store.create(spec()).unwrap().0;
        assert_eq!(store.expire(untimed, u32::MAX as u64), Ok(None));
    }

    #[tokio::test]
    async fn test_commit_publishes_frame() {
        let store = MatchStore::new();
        let (id, creds) = store.create(spec()).unwrap();
        let mut rx = store.subscribe(id).unwrap();

        store
            .submit_turn(id, submission(&creds, Player::Red, 1, &["c2c3", "skip"]))
            .unwrap();
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.turns.len(), 1);
        assert_eq!(frame.turns[0].number, 1);
        assert!(!frame.is_terminal());
    }

    #[tokio::test]
    async fn test_final_frame_closes_channel() {
        let store = MatchStore::new();
        let (id, creds) = store.create(spec()).unwrap();
        let mut rx = store.subscribe(id).unwrap();
        assert_eq!(store.channels.lock().unwrap().len(), 1);

        let mut resign = submission(&creds, Player::Red, 1, &[]);
        resign.turn.resigned = true;
        store.submit_turn(id, resign).unwrap();

        assert!(store.channels.lock().unwrap().is_empty());
        assert!(rx.recv().await.unwrap().is_terminal());
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));

        // late subscribers get a closed feed and leave nothing behind
        let mut late = store.subscribe(id).unwrap();
        assert!(matches!(late.recv().await, Err(broadcast::error::RecvError::Closed)));
        assert!(store.channels.lock().unwrap().is_empty());
    }

    #[test]
    fn test_trapped_start_is_finished() {
        let store = MatchStore::new();
        let trapped = MatchSpec {
            position: Some("7h/8/8/8/r↓v↓6/8/8/H7 - - r -".to_string()),
            ..spec()
        };
        let (id, creds) = store.create(trapped).unwrap();
        let outcome = Outcome::win(Player::Blue, EndReason::Trapped);
        assert_eq!(store.status(id).unwrap(), MatchStatus::Finished { outcome });

        let attempt = submission(&creds, Player::Red, 1, &["a1a2"]);
        assert_eq!(store.submit_turn(id, attempt), Err(StoreError::MatchFinished));
        assert_eq!(store.expire(id, 0), Err(StoreError::MatchFinished));
    }

    #[test]
    fn test_unknown_match() {
        let store = MatchStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.snapshot(id), Err(StoreError::NotFound(id)));
        assert!(matches!(store.subscribe(id), Err(StoreError::NotFound(_))));
    }
}
