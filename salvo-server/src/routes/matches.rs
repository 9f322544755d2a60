//! Match API endpoints

use super::error::ApiError;
use crate::state::ServerState;
use crate::store::{MatchId, MatchSpec, MatchStatus, Receipt, Submission};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use salvo_core::{encode, Move, Player, TimeControl, Turn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Create request
#[derive(Deserialize)]
pub struct CreateRequest {
    pub red: String,
    #[serde(default)]
    pub blue: Option<String>,
    #[serde(default)]
    pub rated: bool,
    #[serde(default)]
    pub initial_ms: u64,
    #[serde(default)]
    pub increment_ms: u64,
    #[serde(default)]
    pub position: Option<String>,
    /// Blue is played by the server
    #[serde(default)]
    pub bot: bool,
}

#[derive(Serialize)]
pub struct CreateResponse {
    pub id: MatchId,
    pub red_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blue_secret: Option<String>,
}

/// Create a match
pub async fn create_match(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<CreateResponse>), ApiError> {
    let blue = match (req.blue, req.bot) {
        (Some(name), _) => name,
        (None, true) => "bot".to_string(),
        (None, false) => return Err(ApiError::bad_request("missing blue player")),
    };

    let spec = MatchSpec {
        red: req.red,
        blue,
        rated: req.rated,
        time_control: TimeControl::new(req.initial_ms, req.increment_ms),
        position: req.position,
    };
    let (id, credentials) = state.store.create(spec)?;

    let blue_secret = if req.bot {
        state.spawn_bot(id, Player::Blue, credentials.blue_secret, rand::random());
        None
    } else {
        Some(credentials.blue_secret)
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateResponse {
            id,
            red_secret: credentials.red_secret,
            blue_secret,
        }),
    ))
}

#[derive(Serialize)]
pub struct ClockView {
    pub red_ms: Option<i64>,
    pub blue_ms: Option<i64>,
}

#[derive(Serialize)]
pub struct MatchView {
    pub id: MatchId,
    pub red: String,
    pub blue: String,
    pub rated: bool,
    pub time_control: TimeControl,
    pub created_at_ms: u64,
    pub status: MatchStatus,
    pub position: String,
    pub clock: ClockView,
    pub log: String,
    pub turns: Vec<Turn>,
}

/// Get match status, position and log
pub async fn get_match(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<MatchId>,
) -> Result<Json<MatchView>, ApiError> {
    let game = state.store.game(id)?;
    let clock = game.clock();
    let status = game.status();
    let position = encode(game.composer.position());
    let turns = game.composer.turns().to_vec();
    let record = game.record;

    Ok(Json(MatchView {
        id,
        red: record.red,
        blue: record.blue,
        rated: record.rated,
        time_control: record.time_control,
        created_at_ms: record.created_at_ms,
        status,
        position,
        clock: ClockView {
            red_ms: clock.remaining(Player::Red),
            blue_ms: clock.remaining(Player::Blue),
        },
        log: record.log,
        turns,
    }))
}

#[derive(Serialize)]
pub struct LegalResponse {
    pub position: String,
    pub moves: Vec<Move>,
}

/// Legal moves in the match's current position
pub async fn get_legal_moves(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<MatchId>,
) -> Result<Json<LegalResponse>, ApiError> {
    let game = state.store.game(id)?;
    Ok(Json(LegalResponse {
        position: encode(game.composer.position()),
        moves: game.composer.legal_moves(),
    }))
}

/// Submit a turn
pub async fn submit_turn(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<MatchId>,
    Json(submission): Json<Submission>,
) -> Result<Json<Receipt>, ApiError> {
    let receipt = state.store.submit_turn(id, submission)?;
    Ok(Json(receipt))
}
