use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use shared::SessionId;

use crate::app_state::AppState;
use crate::coordinator::SaveChunkCommand;
use crate::error::{UploadError, into_response_with_path};

const PATH: &str = "/upload";

/// `POST /upload` — submit one chunk as a multipart request (§6), grounded on the
/// teacher's `UploadArtifactEndpoint::handle_request`.
pub async fn handle(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut session_id: Option<String> = None;
    let mut chunk_index: Option<u64> = None;
    let mut total_chunks: Option<u64> = None;
    let mut file_name: Option<String> = None;
    let mut data: Option<Bytes> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return into_response_with_path(
                    UploadError::Validation {
                        message: format!("malformed multipart body: {e}"),
                        details: serde_json::json!({}),
                    },
                    PATH,
                );
            }
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "sessionId" => session_id = field.text().await.ok(),
            "chunkIndex" => chunk_index = field.text().await.ok().and_then(|v| v.parse().ok()),
            "totalChunks" => total_chunks = field.text().await.ok().and_then(|v| v.parse().ok()),
            "fileName" => file_name = field.text().await.ok(),
            "file" => data = field.bytes().await.ok(),
            _ => {}
        }
    }

    let (Some(session_id), Some(chunk_index), Some(total_chunks), Some(data)) =
        (session_id, chunk_index, total_chunks, data)
    else {
        return into_response_with_path(
            UploadError::Validation {
                message: "multipart request missing one of sessionId, chunkIndex, totalChunks, file".to_string(),
                details: serde_json::json!({}),
            },
            PATH,
        );
    };

    let cmd = SaveChunkCommand {
        session_id: SessionId::new(session_id),
        chunk_index,
        total_chunks,
        data,
        file_name,
        file_size: None,
        chunk_size: None,
    };

    match state.coordinator.save_chunk(cmd).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => into_response_with_path(e, PATH),
    }
}
