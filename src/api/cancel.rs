use axum::extract::{Path, State};
use axum::http::StatusCode;
use shared::SessionId;

use crate::app_state::AppState;

/// `DELETE /upload/{id}` — cancel a session; safe on absent sessions (§4.2, §6).
pub async fn handle(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.coordinator.cancel(&SessionId::new(id)).await;
    StatusCode::OK
}
