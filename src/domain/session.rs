use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use shared::{ResumeRecord, SessionId};

/// Lifecycle state of an upload session (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Completed,
    Failed,
}

/// The server-side upload session record (§3).
///
/// Owned exclusively by the [`crate::infrastructure::status_registry::StatusRegistry`];
/// mutated exclusively by the [`crate::features`] use cases that make up the upload
/// coordinator. `received_chunks` only ever grows within a session's lifetime.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub id: SessionId,
    pub total_chunks: u64,
    pub received_chunks: BTreeSet<u64>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub chunk_size: Option<u64>,
    pub uploaded_bytes: u64,
    pub state: SessionState,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn new(id: SessionId, total_chunks: u64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            total_chunks,
            received_chunks: BTreeSet::new(),
            file_name: None,
            file_size: None,
            chunk_size: None,
            uploaded_bytes: 0,
            state: SessionState::Active,
            error_message: None,
            created_at: now,
            last_updated_at: now,
        }
    }

    /// `missingChunks = [0,totalChunks) \ receivedChunks` (§3 derived views).
    pub fn missing_chunks(&self) -> Vec<u64> {
        (0..self.total_chunks)
            .filter(|i| !self.received_chunks.contains(i))
            .collect()
    }

    /// `min(missingChunks)` or `totalChunks` if there are none.
    pub fn next_expected_chunk(&self) -> u64 {
        (0..self.total_chunks)
            .find(|i| !self.received_chunks.contains(i))
            .unwrap_or(self.total_chunks)
    }

    pub fn can_resume(&self) -> bool {
        self.state == SessionState::Active && (self.received_chunks.len() as u64) < self.total_chunks
    }

    pub fn is_complete(&self) -> bool {
        self.received_chunks.len() as u64 == self.total_chunks
    }

    /// `uploadedBytes/fileSize` when `fileSize` is known, else `|receivedChunks|/totalChunks`.
    pub fn progress_percentage(&self) -> f64 {
        if let Some(size) = self.file_size.filter(|s| *s > 0) {
            (self.uploaded_bytes as f64 / size as f64).min(1.0)
        } else if self.total_chunks > 0 {
            self.received_chunks.len() as f64 / self.total_chunks as f64
        } else {
            0.0
        }
    }

    /// `uploaded / (now - createdAt)`, in bytes/second.
    pub fn upload_speed(&self, now: DateTime<Utc>) -> Option<f64> {
        let elapsed = (now - self.created_at).num_milliseconds();
        if elapsed <= 0 {
            return None;
        }
        Some(self.uploaded_bytes as f64 / (elapsed as f64 / 1000.0))
    }

    pub fn estimated_remaining_time(&self, now: DateTime<Utc>) -> Option<f64> {
        let total = self.file_size?;
        let speed = self.upload_speed(now).filter(|s| *s > 0.0)?;
        Some((total.saturating_sub(self.uploaded_bytes)) as f64 / speed)
    }

    pub fn to_resume_record(&self, now: DateTime<Utc>) -> ResumeRecord {
        ResumeRecord {
            session_id: self.id.clone(),
            total_chunks: self.total_chunks,
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            chunk_size: self.chunk_size,
            received_chunks: self.received_chunks.iter().copied().collect(),
            missing_chunks: self.missing_chunks(),
            next_expected_chunk: self.next_expected_chunk(),
            uploaded_bytes: self.uploaded_bytes,
            progress_percentage: self.progress_percentage(),
            can_resume: self.can_resume(),
            completed: self.state == SessionState::Completed,
            failed: self.state == SessionState::Failed,
            error_message: self.error_message.clone(),
            created_at: self.created_at,
            last_updated_at: self.last_updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(total: u64) -> UploadSession {
        UploadSession::new(SessionId::new("s1"), total, Utc::now())
    }

    #[test]
    fn missing_chunks_starts_as_everything() {
        let s = session(3);
        assert_eq!(s.missing_chunks(), vec![0, 1, 2]);
        assert_eq!(s.next_expected_chunk(), 0);
        assert!(!s.is_complete());
    }

    #[test]
    fn next_expected_chunk_is_totalchunks_when_done() {
        let mut s = session(2);
        s.received_chunks.insert(0);
        s.received_chunks.insert(1);
        assert_eq!(s.next_expected_chunk(), 2);
        assert!(s.is_complete());
        assert!(!s.can_resume());
    }

    #[test]
    fn progress_percentage_prefers_file_size() {
        let mut s = session(4);
        s.file_size = Some(100);
        s.uploaded_bytes = 25;
        assert_eq!(s.progress_percentage(), 0.25);

        s.file_size = None;
        s.received_chunks.insert(0);
        assert_eq!(s.progress_percentage(), 0.25);
    }
}
