//! Store concurrency and stream-following tests

use salvo_core::{Player, Turn, TurnReplicator};
use salvo_server::store::{Credentials, MatchId, MatchSpec, Submission, TurnFrame};
use salvo_server::{follow, Backoff, MatchStore, StoreError, StreamError, TurnSource};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::broadcast;

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
        turn: Turn::new(number, moves.iter().map(|t| t.parse().unwrap()).collect()),
    }
}

fn resignation(creds: &Credentials, player: Player, number: u32) -> Submission {
    let mut submission = submission(creds, player, number, &[]);
    submission.turn.resigned = true;
    submission
}

fn quick_backoff(max_retries: u32) -> Backoff {
    Backoff {
        initial: Duration::from_millis(1),
        cap: Duration::from_millis(4),
        max_retries,
    }
}

/// A finished two-turn match: Red plays, Blue resigns
fn finished_match(store: &MatchStore) -> MatchId {
    let (id, creds) = store.create(spec()).unwrap();
    store
        .submit_turn(id, submission(&creds, Player::Red, 1, &["c2c3", "skip"]))
        .unwrap();
    store.submit_turn(id, resignation(&creds, Player::Blue, 2)).unwrap();
    id
}

// ============================================================================
// Concurrent commits
// ============================================================================

#[test]
fn test_racing_threads_commit_once() {
    let store = Arc::new(MatchStore::new());
    let (id, creds) = store.create(spec()).unwrap();
    let openings = ["c2c3", "d2d3", "e2e3", "f2f3"];

    let handles: Vec<_> = openings
        .iter()
        .map(|opening| {
            let store = Arc::clone(&store);
            let sub = submission(&creds, Player::Red, 1, &[*opening, "skip"]);
            thread::spawn(move || store.submit_turn(id, sub))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);

    for rejected in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(
            rejected,
            StoreError::ConcurrentModification | StoreError::TurnOutOfSequence { expected: 2, got: 1 }
        ));
    }
    assert_eq!(store.snapshot(id).unwrap().turns.len(), 1);
}

#[test]
fn test_alternating_seats_across_threads() {
    let store = Arc::new(MatchStore::new());
    let (id, creds) = store.create(spec()).unwrap();

    let seat = |player: Player, plays: Vec<(u32, &'static str)>| {
        let store = Arc::clone(&store);
        let creds = creds.clone();
        thread::spawn(move || {
            for (number, opening) in plays {
                // retry until the other seat has moved
                loop {
                    match store.submit_turn(id, submission(&creds, player, number, &[opening, "skip"])) {
                        Ok(_) => break,
                        Err(StoreError::TurnOutOfSequence { .. })
                        | Err(StoreError::Unauthorized(_))
                        | Err(StoreError::ConcurrentModification) => thread::yield_now(),
                        Err(other) => panic!("unexpected rejection: {other}"),
                    }
                }
            }
        })
    };

    let red = seat(Player::Red, vec![(1, "c2c3"), (3, "d2d3"), (5, "e2e3")]);
    let blue = seat(Player::Blue, vec![(2, "c7c6"), (4, "d7d6"), (6, "e7e6")]);
    red.join().unwrap();
    blue.join().unwrap();

    let turns = store.snapshot(id).unwrap().turns;
    let numbers: Vec<u32> = turns.iter().map(|t| t.number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
}

// ============================================================================
// Following a live match
// ============================================================================

#[tokio::test]
async fn test_follow_live_match_to_the_end() {
    let store = Arc::new(MatchStore::new());
    let (id, creds) = store.create(spec()).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store
                .submit_turn(id, submission(&creds, Player::Red, 1, &["c2c3", "skip"]))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.submit_turn(id, resignation(&creds, Player::Blue, 2)).unwrap();
        })
    };

    let mut replicator = TurnReplicator::new();
    let mut seen = Vec::new();
    follow(&*store, id, &mut replicator, &quick_backoff(3), |turn| seen.push(turn))
        .await
        .unwrap();
    writer.await.unwrap();

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].number, 1);
    assert!(seen[1].resigned);
    assert_eq!(replicator.cursor(), 3);
}

/// Refuses the first `failures` subscriptions
struct FlakySource {
    store: MatchStore,
    failures: u32,
    attempts: AtomicU32,
}

impl TurnSource for FlakySource {
    fn snapshot(&self, id: MatchId) -> Result<Vec<Turn>, StoreError> {
        TurnSource::snapshot(&self.store, id)
    }

    fn subscribe(&self, id: MatchId) -> Result<broadcast::Receiver<TurnFrame>, StoreError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(StoreError::NotFound(id));
        }
        TurnSource::subscribe(&self.store, id)
    }
}

#[tokio::test]
async fn test_follow_reconnects_after_failures() {
    let store = MatchStore::new();
    let id = finished_match(&store);
    let source = FlakySource { store, failures: 2, attempts: AtomicU32::new(0) };

    let mut replicator = TurnReplicator::new();
    let mut seen = Vec::new();
    follow(&source, id, &mut replicator, &quick_backoff(3), |turn| seen.push(turn.number))
        .await
        .unwrap();

    assert_eq!(seen, vec![1, 2]);
    assert_eq!(source.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_follow_gives_up_after_max_retries() {
    let store = MatchStore::new();
    let id = finished_match(&store);
    let source = FlakySource { store, failures: u32::MAX, attempts: AtomicU32::new(0) };

    let mut replicator = TurnReplicator::new();
    let result = follow(&source, id, &mut replicator, &quick_backoff(3), |_| {}).await;

    match result {
        Err(StreamError::Disconnected { attempts, reason }) => {
            assert_eq!(attempts, 4);
            assert!(reason.contains("not found"));
        }
        other => panic!("expected disconnect, got {other:?}"),
    }
    assert_eq!(replicator.cursor(), 1);
}

/// Hands out an overrun receiver and a stale snapshot on first connect
struct LaggySource {
    store: MatchStore,
    stale: Vec<Turn>,
    snapshots: AtomicU32,
    subscriptions: AtomicU32,
}

impl TurnSource for LaggySource {
    fn snapshot(&self, id: MatchId) -> Result<Vec<Turn>, StoreError> {
        if self.snapshots.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(self.stale.clone());
        }
        TurnSource::snapshot(&self.store, id)
    }

    fn subscribe(&self, id: MatchId) -> Result<broadcast::Receiver<TurnFrame>, StoreError> {
        if self.subscriptions.fetch_add(1, Ordering::SeqCst) > 0 {
            return TurnSource::subscribe(&self.store, id);
        }
        let (sender, rx) = broadcast::channel(1);
        for _ in 0..3 {
            let _ = sender.send(TurnFrame { turns: Vec::new() });
        }
        Ok(rx)
    }
}

#[tokio::test]
async fn test_follow_resyncs_when_lagged() {
    let store = MatchStore::new();
    let id = finished_match(&store);
    let stale = TurnSource::snapshot(&store, id).unwrap()[..1].to_vec();
    let source = LaggySource {
        store,
        stale,
        snapshots: AtomicU32::new(0),
        subscriptions: AtomicU32::new(0),
    };

    let mut replicator = TurnReplicator::new();
    let mut seen = Vec::new();
    follow(&source, id, &mut replicator, &quick_backoff(0), |turn| seen.push(turn.number))
        .await
        .unwrap();

    // lag is not a failure, so a zero-retry policy still resyncs
    assert_eq!(seen, vec![1, 2]);
    assert_eq!(source.snapshots.load(Ordering::SeqCst), 2);
}
