//! HTTP endpoint handlers. Read-only: all game traffic goes over the WebSocket.

use std::sync::Arc;
use axum::{extract::State, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthOut { ok: true, live_games: state.live_games() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_questions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let questions = questions_out(&state.bank);
    info!(target: "reef_quiz", count = questions.len(), "HTTP question bank served");
    Json(questions)
}
