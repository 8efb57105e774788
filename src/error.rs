use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use shared::{ErrorCode, ErrorEnvelope};
use uuid::Uuid;

/// The closed set of error kinds the upload engine can raise (§7).
///
/// Each server component (chunk store, assembler, status registry, validator) raises
/// its own `thiserror`-derived error; the coordinator converts those into one of these
/// variants, attaching the session id and operation, before the transport layer turns it
/// into an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Value,
    },

    #[error("session '{0}' not found")]
    NotFound(String),

    #[error("upload incomplete: missing chunks {missing:?}")]
    IncompleteUpload { missing: Vec<u64> },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("insufficient disk space: requested {requested} bytes, available {available} bytes")]
    InsufficientDiskSpace { requested: u64, available: u64 },

    #[error("assembly failed: {0}")]
    AssemblyFailure(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("too many concurrent uploads")]
    TooManyConcurrentUploads,
}

impl UploadError {
    fn status(&self) -> StatusCode {
        match self {
            UploadError::Validation { .. } => StatusCode::BAD_REQUEST,
            UploadError::NotFound(_) => StatusCode::NOT_FOUND,
            UploadError::IncompleteUpload { .. } => StatusCode::BAD_REQUEST,
            UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::InsufficientDiskSpace { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::AssemblyFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::TooManyConcurrentUploads => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            UploadError::Validation { .. } => ErrorCode::ValidationError,
            UploadError::NotFound(_) => ErrorCode::UploadError,
            UploadError::IncompleteUpload { .. } => ErrorCode::UploadError,
            UploadError::Storage(_) => ErrorCode::StorageError,
            UploadError::InsufficientDiskSpace { .. } => ErrorCode::InsufficientDiskSpace,
            UploadError::AssemblyFailure(_) => ErrorCode::StorageError,
            UploadError::Io(_) => ErrorCode::IoError,
            UploadError::TooManyConcurrentUploads => ErrorCode::TooManyConcurrentUploads,
        }
    }

    fn details(&self) -> Value {
        match self {
            UploadError::Validation { details, .. } => details.clone(),
            UploadError::IncompleteUpload { missing } => json!({ "missingChunks": missing }),
            UploadError::InsufficientDiskSpace {
                requested,
                available,
            } => json!({ "requestedBytes": requested, "availableBytes": available }),
            _ => json!({}),
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        into_response_with_path(self, "")
    }
}

/// Renders an [`UploadError`] the way `into_response` would, but with a known request
/// path — handlers call this directly so the envelope's `path` field is accurate, since
/// `IntoResponse::into_response` has no access to the request.
pub fn into_response_with_path(err: UploadError, path: &str) -> Response {
    let status = err.status();
    let trace_id = Uuid::new_v4().to_string();

    match &err {
        UploadError::Storage(_) | UploadError::InsufficientDiskSpace { .. } | UploadError::AssemblyFailure(_) | UploadError::Io(_) => {
            tracing::error!(trace_id = %trace_id, path, error = %err, "upload error");
        }
        UploadError::NotFound(_) | UploadError::TooManyConcurrentUploads => {
            tracing::warn!(trace_id = %trace_id, path, error = %err, "upload error");
        }
        UploadError::Validation { .. } | UploadError::IncompleteUpload { .. } => {
            tracing::debug!(trace_id = %trace_id, path, error = %err, "upload error");
        }
    }

    let envelope = ErrorEnvelope {
        timestamp: chrono::Utc::now(),
        status: status.as_u16(),
        error: status.canonical_reason().unwrap_or("Error").to_string(),
        message: err.to_string(),
        path: path.to_string(),
        error_code: err.code(),
        details: err
            .details()
            .as_object()
            .cloned()
            .unwrap_or_default(),
        trace_id,
    };

    (status, Json(envelope)).into_response()
}

pub type UploadResult<T> = Result<T, UploadError>;
