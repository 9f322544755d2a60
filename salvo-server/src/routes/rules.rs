//! Stateless rules endpoint

use super::error::ApiError;
use axum::{extract::Query, Json};
use salvo_core::{LegalityEngine, StandardRules};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct LegalParams {
    pub position: String,
}

#[derive(Serialize)]
pub struct LegalTokens {
    pub moves: Vec<String>,
}

/// Legal move tokens for an arbitrary position string
pub async fn legal_for_position(Query(params): Query<LegalParams>) -> Result<Json<LegalTokens>, ApiError> {
    let moves = StandardRules.legal_move_tokens(&params.position)?;
    Ok(Json(LegalTokens { moves }))
}
