use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use shared::SessionId;

use crate::app_state::AppState;
use crate::coordinator::SaveChunkCommand;
use crate::error::{UploadError, into_response_with_path};

const PATH: &str = "/upload/binary";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `POST /upload/binary` — submit one chunk as a raw binary body (§6), the second of
/// the two transport capabilities the pump is parametric over (§9 "Polymorphism over
/// transport").
pub async fn handle(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let session_id = header_str(&headers, "x-file-id").map(str::to_string);
    let chunk_index = header_str(&headers, "x-chunk-number").and_then(|v| v.parse().ok());
    let total_chunks = header_str(&headers, "x-total-chunks").and_then(|v| v.parse().ok());
    let file_name = header_str(&headers, "x-file-name").map(str::to_string);

    let (Some(session_id), Some(chunk_index), Some(total_chunks)) =
        (session_id, chunk_index, total_chunks)
    else {
        return into_response_with_path(
            UploadError::Validation {
                message: "missing one of X-File-Id, X-Chunk-Number, X-Total-Chunks headers".to_string(),
                details: serde_json::json!({}),
            },
            PATH,
        );
    };

    let cmd = SaveChunkCommand {
        session_id: SessionId::new(session_id),
        chunk_index,
        total_chunks,
        data: body,
        file_name,
        file_size: None,
        chunk_size: None,
    };

    match state.coordinator.save_chunk(cmd).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => into_response_with_path(e, PATH),
    }
}
