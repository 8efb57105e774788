use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json, Response};
use shared::SessionId;

use crate::app_state::AppState;
use crate::error::into_response_with_path;

/// `GET /upload/{id}` — the current resume record for one session (§6).
pub async fn handle_one(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let session_id = SessionId::new(id);
    let path = format!("/upload/{session_id}");
    match state.coordinator.get_status(&session_id) {
        Ok(session) => Json(session.to_resume_record(chrono::Utc::now())).into_response(),
        Err(e) => into_response_with_path(e, &path),
    }
}

/// `GET /upload` — every known session, active or terminal (§6).
pub async fn handle_all(State(state): State<AppState>) -> Response {
    let now = chrono::Utc::now();
    let records: Vec<_> = state
        .coordinator
        .list_all()
        .iter()
        .map(|s| s.to_resume_record(now))
        .collect();
    Json(records).into_response()
}

/// `GET /upload/resumable` — sessions that are active and still missing chunks (§6).
pub async fn handle_resumable(State(state): State<AppState>) -> Response {
    let now = chrono::Utc::now();
    let records: Vec<_> = state
        .coordinator
        .list_resumable()
        .iter()
        .map(|s| s.to_resume_record(now))
        .collect();
    Json(records).into_response()
}
