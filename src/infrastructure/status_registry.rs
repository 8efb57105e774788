use chrono::Utc;
use dashmap::DashMap;
use shared::SessionId;

use crate::domain::session::{SessionState, UploadSession};
use crate::error::UploadError;

/// In-memory database of upload sessions (§4.5).
///
/// Thread-safe via `DashMap`'s sharded locking, so concurrent `saveChunk` calls for
/// different sessions never contend, and calls for the same session serialize on that
/// session's shard only — never on the whole registry. This is process-wide state: a
/// single instance is constructed at startup and handed to the coordinator by reference
/// (§9 "Global mutable state"), never reached via an ambient singleton.
///
/// State does not survive a restart (§9 open question 3): chunks already on disk from a
/// prior process are orphaned until a background rebuild scan is added, which this
/// registry does not attempt.
#[derive(Default)]
pub struct StatusRegistry {
    sessions: DashMap<SessionId, UploadSession>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Returns the existing session, or creates one with the given `total_chunks` if
    /// absent. If a session already exists with a different `total_chunks`, this is a
    /// protocol violation (§9 open question 1): reject with `Validation` rather than
    /// silently accepting the first value or the new one.
    pub fn get_or_create(&self, id: &SessionId, total_chunks: u64) -> Result<(), UploadError> {
        if let Some(existing) = self.sessions.get(id) {
            if existing.total_chunks != total_chunks {
                return Err(UploadError::Validation {
                    message: format!(
                        "totalChunks mismatch for session '{id}': session has {}, request declared {total_chunks}",
                        existing.total_chunks
                    ),
                    details: serde_json::json!({ "field": "totalChunks", "sessionTotalChunks": existing.total_chunks, "requestTotalChunks": total_chunks }),
                });
            }
            return Ok(());
        }
        self.sessions
            .insert(id.clone(), UploadSession::new(id.clone(), total_chunks, Utc::now()));
        Ok(())
    }

    pub fn get(&self, id: &SessionId) -> Option<UploadSession> {
        self.sessions.get(id).map(|s| s.clone())
    }

    /// First-write-wins: only sets `file_name` if it is currently unset.
    pub fn set_file_name(&self, id: &SessionId, file_name: &str) {
        if file_name.is_empty() {
            return;
        }
        if let Some(mut session) = self.sessions.get_mut(id) {
            if session.file_name.is_none() {
                session.file_name = Some(file_name.to_string());
                session.last_updated_at = Utc::now();
            }
        }
    }

    pub fn set_file_size(&self, id: &SessionId, file_size: u64) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            if session.file_size.is_none() {
                session.file_size = Some(file_size);
                session.last_updated_at = Utc::now();
            }
        }
    }

    pub fn set_chunk_size(&self, id: &SessionId, chunk_size: u64) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            if session.chunk_size.is_none() {
                session.chunk_size = Some(chunk_size);
                session.last_updated_at = Utc::now();
            }
        }
    }

    /// Records `chunk_index` in `received_chunks`. The uploaded-byte counter only
    /// advances when the index transitions from absent to present, so replaying the
    /// same chunk never double-counts (§4.2 concurrency contract).
    pub fn add_chunk(
        &self,
        id: &SessionId,
        chunk_index: u64,
        byte_count: u64,
    ) -> Result<(), UploadError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| UploadError::NotFound(id.to_string()))?;
        if session.received_chunks.insert(chunk_index) {
            session.uploaded_bytes += byte_count;
        }
        session.last_updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_completed(&self, id: &SessionId) -> Result<(), UploadError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| UploadError::NotFound(id.to_string()))?;
        session.state = SessionState::Completed;
        session.last_updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_failed(&self, id: &SessionId, message: impl Into<String>) -> Result<(), UploadError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| UploadError::NotFound(id.to_string()))?;
        session.state = SessionState::Failed;
        session.error_message = Some(message.into());
        session.last_updated_at = Utc::now();
        Ok(())
    }

    pub fn remove(&self, id: &SessionId) -> Option<UploadSession> {
        self.sessions.remove(id).map(|(_, v)| v)
    }

    pub fn list_all(&self) -> Vec<UploadSession> {
        self.sessions.iter().map(|r| r.value().clone()).collect()
    }

    pub fn list_resumable(&self) -> Vec<UploadSession> {
        self.sessions
            .iter()
            .filter(|r| r.value().can_resume())
            .map(|r| r.value().clone())
            .collect()
    }

    /// Totals by state, for monitoring.
    pub fn statistics(&self) -> RegistryStatistics {
        let mut stats = RegistryStatistics::default();
        for entry in self.sessions.iter() {
            match entry.value().state {
                SessionState::Active => stats.active += 1,
                SessionState::Completed => stats.completed += 1,
                SessionState::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Removes every session in a terminal state whose `last_updated_at` is older than
    /// `max_age`. Returns the ids removed, so the caller can also clean up their chunk
    /// store directories.
    pub fn cleanup(&self, max_age: chrono::Duration) -> Vec<SessionId> {
        let threshold = Utc::now() - max_age;
        let stale: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|r| {
                let s = r.value();
                matches!(s.state, SessionState::Completed | SessionState::Failed)
                    && s.last_updated_at < threshold
            })
            .map(|r| r.key().clone())
            .collect();
        for id in &stale {
            self.sessions.remove(id);
        }
        stale
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct RegistryStatistics {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}
