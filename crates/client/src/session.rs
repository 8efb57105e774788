//! Client-side session record and registry (§2 "Session registry (client)", §3
//! "UploadTask").

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use shared::SessionId;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Mirrors the server's `SessionState` (§4.1 state machine), with the client-only
/// `Pending` and `Cancelled` terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Uploading,
    Paused,
    Completing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }
}

/// One upload in progress, owned exclusively by its entry in the [`ClientSessionRegistry`].
///
/// Holds the path to the source file rather than an open handle: the slicer opens a
/// fresh positional handle per chunk read (§5 "the file-handle on the client is not
/// shared across concurrent chunk reads") so there is no long-lived handle to own here.
pub struct UploadTask {
    pub session_id: SessionId,
    pub file_path: PathBuf,
    pub file_name: Option<String>,
    pub file_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u64,
    pub received_chunks: BTreeSet<u64>,
    pub uploaded_bytes: u64,
    pub state: TaskState,
    pub cancellation: CancellationToken,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl UploadTask {
    pub fn new(
        session_id: SessionId,
        file_path: PathBuf,
        file_name: Option<String>,
        file_size: u64,
        chunk_size: u64,
        total_chunks: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            file_path,
            file_name,
            file_size,
            chunk_size,
            total_chunks,
            received_chunks: BTreeSet::new(),
            uploaded_bytes: 0,
            state: TaskState::Pending,
            cancellation: CancellationToken::new(),
            created_at: now,
            last_updated_at: now,
        }
    }

    pub fn missing_chunks(&self) -> Vec<u64> {
        (0..self.total_chunks)
            .filter(|i| !self.received_chunks.contains(i))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.received_chunks.len() as u64 == self.total_chunks
    }

    pub fn upload_speed(&self, now: DateTime<Utc>) -> Option<f64> {
        let elapsed = (now - self.created_at).num_milliseconds();
        if elapsed <= 0 {
            return None;
        }
        Some(self.uploaded_bytes as f64 / (elapsed as f64 / 1000.0))
    }

    pub fn estimated_remaining_time(&self, now: DateTime<Utc>) -> Option<f64> {
        let speed = self.upload_speed(now).filter(|s| *s > 0.0)?;
        Some((self.file_size.saturating_sub(self.uploaded_bytes)) as f64 / speed)
    }
}

/// Maps session id to session record (§2). Thread-safe via `DashMap`, same concurrency
/// discipline as the server's status registry, with each task's mutable fields guarded
/// by its own `Mutex` so pump workers updating different sessions never contend.
#[derive(Default)]
pub struct ClientSessionRegistry {
    tasks: DashMap<SessionId, Arc<Mutex<UploadTask>>>,
}

impl ClientSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, task: UploadTask) -> Arc<Mutex<UploadTask>> {
        let id = task.session_id.clone();
        let handle = Arc::new(Mutex::new(task));
        self.tasks.insert(id, handle.clone());
        handle
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Mutex<UploadTask>>> {
        self.tasks.get(id).map(|r| r.clone())
    }

    pub fn remove(&self, id: &SessionId) -> Option<Arc<Mutex<UploadTask>>> {
        self.tasks.remove(id).map(|(_, v)| v)
    }

    pub async fn active_session_ids(&self) -> Vec<SessionId> {
        let entries: Vec<(SessionId, Arc<Mutex<UploadTask>>)> = self
            .tasks
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        let mut active = Vec::new();
        for (id, task) in entries {
            if !task.lock().await.state.is_terminal() {
                active.push(id);
            }
        }
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_chunks_starts_as_everything() {
        let task = UploadTask::new(
            SessionId::new("s1"),
            PathBuf::from("/tmp/does-not-matter"),
            None,
            13,
            6,
            3,
            Utc::now(),
        );
        assert_eq!(task.missing_chunks(), vec![0, 1, 2]);
        assert!(!task.is_complete());
    }

    #[tokio::test]
    async fn registry_round_trips_a_task() {
        let registry = ClientSessionRegistry::new();
        let id = SessionId::new("s1");
        let task = UploadTask::new(id.clone(), PathBuf::new(), None, 10, 5, 2, Utc::now());
        registry.insert(task);

        assert!(registry.get(&id).is_some());
        registry.remove(&id);
        assert!(registry.get(&id).is_none());
    }
}
