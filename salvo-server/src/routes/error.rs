//! API error responses

use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use salvo_core::{GameError, MalformedPosition};
use serde_json::json;
use tracing::warn;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            StoreError::Game(GameError::GameOver) | StoreError::MatchFinished => StatusCode::GONE,
            StoreError::Game(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::Position(_) => StatusCode::BAD_REQUEST,
            StoreError::ConcurrentModification | StoreError::TurnOutOfSequence { .. } => {
                StatusCode::CONFLICT
            }
            StoreError::Log(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<MalformedPosition> for ApiError {
    fn from(err: MalformedPosition) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = %self.message, "request failed");
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
