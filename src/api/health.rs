use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    sessions: SessionCounts,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounts {
    active: usize,
    completed: usize,
    failed: usize,
}

/// `GET /health` (§10.4 ambient addition) — liveness plus a cheap registry snapshot,
/// grounded on the teacher's `health` endpoint shape.
pub async fn handle(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.coordinator.statistics();
    Json(HealthResponse {
        status: "UP",
        sessions: SessionCounts {
            active: stats.active,
            completed: stats.completed,
            failed: stats.failed,
        },
    })
}
