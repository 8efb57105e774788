use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use shared::SessionId;

use crate::app_state::AppState;
use crate::error::into_response_with_path;

#[derive(Debug, Deserialize)]
pub struct ResumeQuery {
    #[serde(rename = "totalChunks")]
    pub total_chunks: u64,
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
    #[serde(rename = "fileSize")]
    pub file_size: Option<u64>,
    #[serde(rename = "chunkSize")]
    pub chunk_size: Option<u64>,
}

/// `POST /upload/{id}/resume` — the resume handshake (§6, §8 S3): returns the server's
/// view of a session so the client dispatches only the missing chunks.
pub async fn handle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ResumeQuery>,
) -> Response {
    let session_id = SessionId::new(id);
    let path = format!("/upload/{session_id}/resume");

    match state.coordinator.resume_handshake(
        &session_id,
        query.total_chunks,
        query.file_name.as_deref(),
        query.file_size,
        query.chunk_size,
    ) {
        Ok(session) => Json(session.to_resume_record(chrono::Utc::now())).into_response(),
        Err(e) => into_response_with_path(e, &path),
    }
}
