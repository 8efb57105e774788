use std::path::{Path, PathBuf};

use shared::SessionId;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;
use crate::error::UploadError;
use crate::infrastructure::disk_space;

/// Durable persistence of individual chunks ahead of assembly (§4.3).
///
/// Layout: `<base>/<prefix><sessionId>/<sessionId>.part<chunkIndex>`. The store is
/// contention-free across sessions (disjoint directories) and tolerates concurrent
/// writes to different indices within one session — each write opens its own file
/// handle and touches no shared in-process state.
#[derive(Clone)]
pub struct ChunkStore {
    base_dir: PathBuf,
    temp_dir_prefix: String,
    safety_buffer_bytes: u64,
    min_free_bytes: u64,
}

impl ChunkStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            base_dir: config.base_dir.clone(),
            temp_dir_prefix: config.temp_dir_prefix.clone(),
            safety_buffer_bytes: config.safety_buffer_bytes,
            min_free_bytes: config.min_free_bytes,
        }
    }

    pub fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.base_dir
            .join(format!("{}{}", self.temp_dir_prefix, session_id))
    }

    pub fn chunk_path(&self, session_id: &SessionId, chunk_index: u64) -> PathBuf {
        self.session_dir(session_id)
            .join(format!("{session_id}.part{chunk_index}"))
    }

    /// Ensures the session temp directory exists, preflights disk space, then writes the
    /// chunk create-or-truncate. Idempotent: replaying the same `(session_id,
    /// chunk_index)` overwrites the same on-disk artifact.
    pub async fn write(
        &self,
        session_id: &SessionId,
        chunk_index: u64,
        bytes: &[u8],
    ) -> Result<(), UploadError> {
        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| UploadError::Storage(format!("create session dir: {e}")))?;

        disk_space::preflight(&dir, bytes.len() as u64, self.safety_buffer_bytes, self.min_free_bytes)?;

        let path = self.chunk_path(session_id, chunk_index);
        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| UploadError::Storage(format!("create chunk file: {e}")))?;
        file.write_all(bytes)
            .await
            .map_err(|e| UploadError::Storage(format!("write chunk file: {e}")))?;
        file.flush()
            .await
            .map_err(|e| UploadError::Storage(format!("flush chunk file: {e}")))?;
        Ok(())
    }

    pub async fn exists(&self, session_id: &SessionId, chunk_index: u64) -> bool {
        fs::metadata(self.chunk_path(session_id, chunk_index))
            .await
            .is_ok()
    }

    pub async fn size(&self, session_id: &SessionId, chunk_index: u64) -> Result<u64, UploadError> {
        let meta = fs::metadata(self.chunk_path(session_id, chunk_index))
            .await
            .map_err(|e| UploadError::Storage(format!("stat chunk file: {e}")))?;
        Ok(meta.len())
    }

    /// Returns the path of every chunk `0..total_chunks` in order; fails if any are
    /// missing.
    pub async fn list_all(
        &self,
        session_id: &SessionId,
        total_chunks: u64,
    ) -> Result<Vec<PathBuf>, UploadError> {
        let mut paths = Vec::with_capacity(total_chunks as usize);
        for i in 0..total_chunks {
            let path = self.chunk_path(session_id, i);
            if fs::metadata(&path).await.is_err() {
                return Err(UploadError::AssemblyFailure(format!(
                    "chunk {i} missing for session '{session_id}'"
                )));
            }
            paths.push(path);
        }
        Ok(paths)
    }

    /// Best-effort recursive removal of the session temp directory; swallows
    /// per-entry errors rather than failing the caller.
    pub async fn cleanup(&self, session_id: &SessionId) {
        let dir = self.session_dir(session_id);
        if let Err(e) = fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(session_id = %session_id, error = %e, "chunk store cleanup failed");
            }
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &Path) -> StorageConfig {
        let mut c = StorageConfig::default();
        c.base_dir = base.to_path_buf();
        c
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(&config(tmp.path()));
        let id = SessionId::new("s1");

        store.write(&id, 0, b"hello").await.unwrap();
        assert!(store.exists(&id, 0).await);
        assert_eq!(store.size(&id, 0).await.unwrap(), 5);
        assert!(!store.exists(&id, 1).await);
    }

    #[tokio::test]
    async fn write_is_idempotent_on_replay() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(&config(tmp.path()));
        let id = SessionId::new("s1");

        store.write(&id, 0, b"first").await.unwrap();
        store.write(&id, 0, b"second-longer-value").await.unwrap();
        assert_eq!(store.size(&id, 0).await.unwrap(), "second-longer-value".len() as u64);
    }

    #[tokio::test]
    async fn list_all_fails_when_chunk_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(&config(tmp.path()));
        let id = SessionId::new("s1");
        store.write(&id, 0, b"a").await.unwrap();

        let result = store.list_all(&id, 2).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn cleanup_removes_session_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(&config(tmp.path()));
        let id = SessionId::new("s1");
        store.write(&id, 0, b"a").await.unwrap();

        store.cleanup(&id).await;
        assert!(!store.exists(&id, 0).await);
        assert!(fs::metadata(store.session_dir(&id)).await.is_err());
    }

    #[tokio::test]
    async fn cleanup_on_absent_session_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(&config(tmp.path()));
        store.cleanup(&SessionId::new("never-existed")).await;
    }
}
