//! Server-push turn stream
//!
//! `GET /api/matches/:id/stream?cursor=n` sends every turn numbered `n` or
//! later as `turns` events, then follows live commits. The stream ends after
//! the frame carrying the game's outcome.

use super::error::ApiError;
use crate::state::ServerState;
use crate::store::{MatchId, MatchStore, TurnFrame};
use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use salvo_core::{Turn, TurnReplicator};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

#[derive(Deserialize)]
pub struct StreamParams {
    pub cursor: Option<u32>,
}

struct Feed {
    store: Arc<MatchStore>,
    id: MatchId,
    rx: broadcast::Receiver<TurnFrame>,
    /// Releases turns in order, once each, from the client's cursor on
    replicator: TurnReplicator,
    backlog: Option<Vec<Turn>>,
    /// The match was already over when the backlog was read
    finished: bool,
    done: bool,
}

impl Feed {
    /// Turns the replicator releases from `turns`, as one frame
    fn take_new(&mut self, turns: Vec<Turn>) -> Option<TurnFrame> {
        let mut fresh = Vec::new();
        self.replicator.receive(turns, |turn| fresh.push(turn));
        if fresh.is_empty() {
            None
        } else {
            Some(TurnFrame { turns: fresh })
        }
    }

    async fn next_frame(&mut self) -> Option<TurnFrame> {
        if let Some(backlog) = self.backlog.take() {
            if let Some(frame) = self.take_new(backlog) {
                return Some(frame);
            }
            // client already holds everything there is
            if self.finished {
                return None;
            }
        }

        loop {
            match self.rx.recv().await {
                Ok(frame) => {
                    if let Some(frame) = self.take_new(frame.turns) {
                        return Some(frame);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Stream for match {} lagged by {}, resyncing", self.id, skipped);
                    let snapshot = self.store.snapshot(self.id).ok()?;
                    if let Some(frame) = self.take_new(snapshot.turns) {
                        return Some(frame);
                    }
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

pub async fn stream_turns(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<MatchId>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    // subscribe first so a commit between the two calls is not lost
    let rx = state.store.subscribe(id)?;
    let game = state.store.game(id)?;

    let feed = Feed {
        store: Arc::clone(&state.store),
        id,
        rx,
        replicator: TurnReplicator::starting_at(params.cursor.unwrap_or(1)),
        backlog: Some(game.composer.turns().to_vec()),
        finished: game.composer.is_finished(),
        done: false,
    };

    let events = stream::unfold(feed, |mut feed| async move {
        if feed.done {
            return None;
        }
        let frame = feed.next_frame().await?;
        feed.done = frame.is_terminal();
        let event = Event::default().event("turns").json_data(&frame);
        Some((event, feed))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MatchSpec, Submission};
    use salvo_core::{Move, Player};

    fn turn(number: u32) -> Turn {
        Turn::new(number, vec![Move::Skip])
    }

    fn feed(store: Arc<MatchStore>, id: MatchId, rx: broadcast::Receiver<TurnFrame>) -> Feed {
        Feed {
            store,
            id,
            rx,
            replicator: TurnReplicator::new(),
            backlog: Some(Vec::new()),
            finished: false,
            done: false,
        }
    }

    async fn drain(mut feed: Feed) -> Vec<Vec<u32>> {
        let mut frames = Vec::new();
        while let Some(frame) = feed.next_frame().await {
            frames.push(frame.turns.iter().map(|t| t.number).collect());
        }
        frames
    }

    #[tokio::test]
    async fn test_reordered_frames_are_delivered_in_order() {
        let store = Arc::new(MatchStore::new());
        let (tx, rx) = broadcast::channel(8);
        let feed = feed(store, MatchId::new_v4(), rx);

        tx.send(TurnFrame { turns: vec![turn(2)] }).unwrap();
        tx.send(TurnFrame { turns: vec![turn(1)] }).unwrap();
        tx.send(TurnFrame { turns: vec![turn(1), turn(2), turn(3)] }).unwrap();
        drop(tx);

        assert_eq!(drain(feed).await, vec![vec![1, 2], vec![3]]);
    }

    #[tokio::test]
    async fn test_lagged_feed_resyncs_from_snapshot() {
        let store = Arc::new(MatchStore::new());
        let spec = MatchSpec { red: "a".into(), blue: "b".into(), ..MatchSpec::default() };
        let (id, creds) = store.create(spec).unwrap();
        for (number, player, opening) in [(1, Player::Red, "c2c3"), (2, Player::Blue, "c7c6")] {
            let submission = Submission {
                player,
                secret: creds.secret(player).to_string(),
                turn: Turn::new(number, vec![opening.parse().unwrap(), Move::Skip]),
            };
            store.submit_turn(id, submission).unwrap();
        }

        let (tx, rx) = broadcast::channel(1);
        let feed = feed(Arc::clone(&store), id, rx);
        for _ in 0..3 {
            tx.send(TurnFrame { turns: Vec::new() }).unwrap();
        }
        drop(tx);

        assert_eq!(drain(feed).await, vec![vec![1, 2]]);
    }

    #[tokio::test]
    async fn test_finished_backlog_ends_without_frames() {
        let store = Arc::new(MatchStore::new());
        let (_tx, rx) = broadcast::channel(1);
        let mut feed = feed(store, MatchId::new_v4(), rx);
        feed.finished = true;

        assert!(drain(feed).await.is_empty());
    }
}
