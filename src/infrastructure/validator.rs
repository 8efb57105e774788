use serde_json::json;

use crate::config::StorageConfig;
use crate::error::UploadError;

const RESERVED_WINDOWS_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// A single field validation failure, collected so a request can be rejected with every
/// offending field named at once (§4.6).
#[derive(Debug, Clone)]
pub struct FieldError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

/// Rejects malformed requests before they reach the chunk store (§4.6).
#[derive(Clone)]
pub struct Validator {
    config: StorageConfig,
}

impl Validator {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn validate_session_id(&self, session_id: &str, errors: &mut Vec<FieldError>) {
        if session_id.is_empty() {
            errors.push(FieldError {
                field: "sessionId",
                value: session_id.to_string(),
                message: "must not be empty".to_string(),
            });
        } else if session_id.len() > 255 {
            errors.push(FieldError {
                field: "sessionId",
                value: session_id.to_string(),
                message: "must be at most 255 bytes".to_string(),
            });
        } else if !session_id.chars().all(|c| !c.is_control()) {
            errors.push(FieldError {
                field: "sessionId",
                value: session_id.to_string(),
                message: "must contain only printable characters".to_string(),
            });
        }
    }

    pub fn validate_total_chunks(&self, total_chunks: u64, errors: &mut Vec<FieldError>) {
        if total_chunks < 1 || total_chunks > self.config.max_chunk_count {
            errors.push(FieldError {
                field: "totalChunks",
                value: total_chunks.to_string(),
                message: format!(
                    "must be between 1 and {} (got {total_chunks})",
                    self.config.max_chunk_count
                ),
            });
        }
    }

    pub fn validate_chunk_index(
        &self,
        chunk_index: u64,
        total_chunks: u64,
        errors: &mut Vec<FieldError>,
    ) {
        if chunk_index >= total_chunks {
            errors.push(FieldError {
                field: "chunkIndex",
                value: chunk_index.to_string(),
                message: format!("must be in [0, {total_chunks}) (got {chunk_index})"),
            });
        }
    }

    pub fn validate_chunk_bytes(&self, len: usize, total_chunks: u64, errors: &mut Vec<FieldError>) {
        let len = len as u64;
        if len == 0 && total_chunks > 1 {
            errors.push(FieldError {
                field: "file",
                value: "0 bytes".to_string(),
                message: "empty chunks are only permitted when totalChunks == 1".to_string(),
            });
        } else if len > self.config.max_chunk_size {
            errors.push(FieldError {
                field: "file",
                value: format!("{len} bytes"),
                message: format!("exceeds max chunk size of {} bytes", self.config.max_chunk_size),
            });
        }
    }

    pub fn validate_file_name(&self, file_name: Option<&str>, errors: &mut Vec<FieldError>) {
        let Some(name) = file_name else { return };
        if name.is_empty() {
            return;
        }
        if name.len() > 255 {
            errors.push(FieldError {
                field: "fileName",
                value: name.to_string(),
                message: "must be at most 255 bytes".to_string(),
            });
            return;
        }
        if name.contains("..") || name.contains('/') || name.contains('\\') {
            errors.push(FieldError {
                field: "fileName",
                value: name.to_string(),
                message: "must not contain path separators or '..'".to_string(),
            });
            return;
        }
        if name.chars().any(|c| c.is_control() || c == '\0') {
            errors.push(FieldError {
                field: "fileName",
                value: name.to_string(),
                message: "must not contain control or null bytes".to_string(),
            });
            return;
        }
        let stem = name.split('.').next().unwrap_or(name).to_uppercase();
        if RESERVED_WINDOWS_NAMES.contains(&stem.as_str()) {
            errors.push(FieldError {
                field: "fileName",
                value: name.to_string(),
                message: "must not be a reserved device name".to_string(),
            });
            return;
        }
        if let Some(ext) = name.rsplit('.').next().filter(|e| *e != name) {
            let ext = ext.to_lowercase();
            if !self.config.extension_allow_list.is_empty()
                && !self.config.extension_allow_list.iter().any(|a| a.eq_ignore_ascii_case(&ext))
            {
                errors.push(FieldError {
                    field: "fileName",
                    value: name.to_string(),
                    message: format!("extension '{ext}' is not on the allow-list"),
                });
            } else if self
                .config
                .extension_block_list
                .iter()
                .any(|b| b.eq_ignore_ascii_case(&ext))
            {
                errors.push(FieldError {
                    field: "fileName",
                    value: name.to_string(),
                    message: format!("extension '{ext}' is blocked"),
                });
            }
        }
    }

    /// Turns a batch of collected field errors into a single [`UploadError::Validation`],
    /// or `Ok(())` if none were collected — shared by [`Self::validate_save_chunk`] and
    /// any other caller (e.g. the resume handshake) that assembles its own field subset.
    pub fn to_validation_result(errors: Vec<FieldError>) -> Result<(), UploadError> {
        to_result(errors)
    }

    /// Validates a full `saveChunk` request, returning a single [`UploadError::Validation`]
    /// naming every offending field if any rule fails.
    pub fn validate_save_chunk(
        &self,
        session_id: &str,
        chunk_index: u64,
        total_chunks: u64,
        chunk_len: usize,
        file_name: Option<&str>,
    ) -> Result<(), UploadError> {
        let mut errors = Vec::new();
        self.validate_session_id(session_id, &mut errors);
        self.validate_total_chunks(total_chunks, &mut errors);
        self.validate_chunk_index(chunk_index, total_chunks, &mut errors);
        self.validate_chunk_bytes(chunk_len, total_chunks, &mut errors);
        self.validate_file_name(file_name, &mut errors);
        to_result(errors)
    }
}

fn to_result(errors: Vec<FieldError>) -> Result<(), UploadError> {
    if errors.is_empty() {
        return Ok(());
    }
    let message = errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ");
    let details = json!({
        "fields": errors.iter().map(|e| json!({
            "field": e.field,
            "value": e.value,
            "message": e.message,
        })).collect::<Vec<_>>()
    });
    Err(UploadError::Validation { message, details })
}
