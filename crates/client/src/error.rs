//! Client-side error taxonomy (§10.2): mirrors the server's tagged-variant approach and
//! classifies each variant retryable or terminal per §4.1's retry policy table.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("server rejected the request ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("upload cancelled")]
    Cancelled,

    #[error("retries exhausted for chunk {chunk_index} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        chunk_index: u64,
        attempts: u32,
        last_error: String,
    },

    #[error("local file error: {0}")]
    File(String),

    #[error("session '{0}' not found locally")]
    UnknownSession(String),

    #[error("refresh bridge error: {0}")]
    RefreshBridge(String),
}

impl ClientError {
    /// Retryable: transport errors, timeouts, and HTTP 408/429/500/502/503/504 (§4.1).
    /// Non-retryable: cancellation and every other status.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Timeout => true,
            ClientError::Server { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            ClientError::Cancelled
            | ClientError::RetriesExhausted { .. }
            | ClientError::File(_)
            | ClientError::UnknownSession(_)
            | ClientError::RefreshBridge(_) => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if let Some(status) = err.status() {
            ClientError::Server {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::File(err.to_string())
    }
}
