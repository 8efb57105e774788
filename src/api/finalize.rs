use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::SessionId;

use crate::app_state::AppState;
use crate::error::into_response_with_path;

/// `POST /upload/{id}/complete` — finalize a session (§6).
pub async fn handle(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let session_id = SessionId::new(id);
    let path = format!("/upload/{session_id}/complete");
    match state.coordinator.finalize(&session_id).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => into_response_with_path(e, &path),
    }
}
