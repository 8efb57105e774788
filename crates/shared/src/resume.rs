use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SessionId;

/// The resume record: the server's view of a session, as returned by the resume
/// handshake and the status-query endpoints (§6 "Resume record").
///
/// This is the one shape both sides of the wire agree on byte-for-byte, so it lives in
/// `shared` rather than being duplicated as a server DTO and a client model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub session_id: SessionId,
    pub total_chunks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
    pub received_chunks: Vec<u64>,
    pub missing_chunks: Vec<u64>,
    pub next_expected_chunk: u64,
    pub uploaded_bytes: u64,
    pub progress_percentage: f64,
    pub can_resume: bool,
    pub completed: bool,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}
