use serde::{Deserialize, Serialize};

/// Machine-readable error codes (§6, §7). Kept as a string-backed enum so the wire
/// representation is stable even if variants are reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    UploadError,
    StorageError,
    InsufficientDiskSpace,
    IoError,
    InternalError,
    TooManyConcurrentUploads,
}

/// The uniform error envelope returned by every non-2xx response (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
    pub error_code: ErrorCode,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    pub trace_id: String,
}
