//! The upload coordinator (§4.2): the single mutator of server state, and the only
//! component a transport adapter talks to.
//!
//! Grounded on the teacher's `UploadArtifactChunkUseCase` (chunk persistence +
//! progress-event emission) and its `UploadArtifactEndpoint` (validate → delegate →
//! translate), collapsed into one coordinator because, unlike the teacher's
//! multi-backend artifact storage (S3/Mongo swappable via `ports.rs` traits), this
//! engine has exactly one chunk store, one status registry, one assembler and one
//! validator implementation — a ports/DI indirection here would be abstraction with no
//! second caller.

use std::sync::Arc;

use chrono::Utc;
use shared::SessionId;
use tokio::sync::Semaphore;

use crate::domain::UploadSession;
use crate::error::{UploadError, UploadResult};
use crate::infrastructure::{Assembler, ChunkStore, StatusRegistry, Validator};

/// Everything needed to fully describe one inbound chunk (§6: both the multipart and
/// binary endpoints normalize into this before calling the coordinator).
pub struct SaveChunkCommand {
    pub session_id: SessionId,
    pub chunk_index: u64,
    pub total_chunks: u64,
    pub data: bytes::Bytes,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub chunk_size: Option<u64>,
}

#[derive(Clone)]
pub struct UploadCoordinator {
    chunk_store: Arc<ChunkStore>,
    status_registry: Arc<StatusRegistry>,
    assembler: Arc<Assembler>,
    validator: Arc<Validator>,
    concurrency: Arc<Semaphore>,
}

impl UploadCoordinator {
    pub fn new(
        chunk_store: Arc<ChunkStore>,
        status_registry: Arc<StatusRegistry>,
        assembler: Arc<Assembler>,
        validator: Arc<Validator>,
        max_concurrent_uploads: usize,
    ) -> Self {
        Self {
            chunk_store,
            status_registry,
            assembler,
            validator,
            concurrency: Arc::new(Semaphore::new(max_concurrent_uploads)),
        }
    }

    /// Validates, persists bytes, updates status. Never auto-finalizes — the client
    /// (or caller) must explicitly call [`Self::finalize`] once every chunk has landed.
    ///
    /// Admission is gated by the configured `max_concurrent_uploads` ceiling (§10.3):
    /// a chunk arriving once the ceiling is saturated is shed with a retryable error
    /// rather than queued, so a slow client can't starve others of in-flight capacity.
    pub async fn save_chunk(&self, cmd: SaveChunkCommand) -> UploadResult<()> {
        let _permit = self
            .concurrency
            .try_acquire()
            .map_err(|_| UploadError::TooManyConcurrentUploads)?;

        self.validator.validate_save_chunk(
            cmd.session_id.as_str(),
            cmd.chunk_index,
            cmd.total_chunks,
            cmd.data.len(),
            cmd.file_name.as_deref(),
        )?;

        self.status_registry
            .get_or_create(&cmd.session_id, cmd.total_chunks)?;

        if let Some(name) = cmd.file_name.as_deref() {
            self.status_registry.set_file_name(&cmd.session_id, name);
        }
        if let Some(size) = cmd.file_size {
            self.status_registry.set_file_size(&cmd.session_id, size);
        }
        if let Some(size) = cmd.chunk_size {
            self.status_registry.set_chunk_size(&cmd.session_id, size);
        }

        let already_received = self
            .status_registry
            .get(&cmd.session_id)
            .map(|s| s.received_chunks.contains(&cmd.chunk_index))
            .unwrap_or(false);

        self.chunk_store
            .write(&cmd.session_id, cmd.chunk_index, &cmd.data)
            .await
            .inspect_err(|e| {
                tracing::error!(session_id = %cmd.session_id, chunk_index = cmd.chunk_index, error = %e, "chunk write failed");
            })?;

        let byte_count = if already_received { 0 } else { cmd.data.len() as u64 };
        self.status_registry
            .add_chunk(&cmd.session_id, cmd.chunk_index, byte_count)?;

        tracing::info!(session_id = %cmd.session_id, chunk_index = cmd.chunk_index, "chunk accepted");
        Ok(())
    }

    /// Refuses with `IncompleteUpload` if any chunk is missing. Otherwise assembles,
    /// marks `Completed`, and removes the temp directory. On assembler failure, marks
    /// `Failed` and leaves the temp directory for post-mortem (§4.2).
    pub async fn finalize(&self, session_id: &SessionId) -> UploadResult<std::path::PathBuf> {
        let session = self
            .status_registry
            .get(session_id)
            .ok_or_else(|| UploadError::NotFound(session_id.to_string()))?;

        if !session.is_complete() {
            return Err(UploadError::IncompleteUpload {
                missing: session.missing_chunks(),
            });
        }

        let chunk_paths = self
            .chunk_store
            .list_all(session_id, session.total_chunks)
            .await?;

        let base_dir = self.chunk_store.base_dir().to_path_buf();
        let destination = Assembler::resolve_destination(
            &base_dir,
            session_id.as_str(),
            session.file_name.as_deref(),
        );

        let assembler = self.assembler.clone();
        let assemble_paths = chunk_paths.clone();
        let assemble_dest = destination.clone();
        let assembled = tokio::task::spawn_blocking(move || {
            assembler.assemble(&assemble_paths, &assemble_dest)
        })
        .await
        .map_err(|e| UploadError::Storage(format!("assembly task panicked: {e}")))?;

        match assembled {
            Ok(_) => {
                self.status_registry.mark_completed(session_id)?;
                self.chunk_store.cleanup(session_id).await;
                self.status_registry.remove(session_id);
                tracing::info!(session_id = %session_id, path = %destination.display(), "upload finalized");
                Ok(destination)
            }
            Err(e) => {
                self.status_registry.mark_failed(session_id, e.to_string())?;
                tracing::error!(session_id = %session_id, error = %e, "assembly failed, temp data preserved");
                Err(e)
            }
        }
    }

    /// Removes temporary data and the session record unconditionally; safe on absent
    /// sessions (§4.2).
    pub async fn cancel(&self, session_id: &SessionId) {
        self.chunk_store.cleanup(session_id).await;
        self.status_registry.remove(session_id);
        tracing::info!(session_id = %session_id, "upload cancelled");
    }

    /// The resume handshake (§6, §8 S3): returns the server's view of a session,
    /// creating it if this is the first contact (e.g. a client that crashed before
    /// sending any chunk, then comes back to ask before it starts sending).
    pub fn resume_handshake(
        &self,
        session_id: &SessionId,
        total_chunks: u64,
        file_name: Option<&str>,
        file_size: Option<u64>,
        chunk_size: Option<u64>,
    ) -> UploadResult<UploadSession> {
        let mut errors = Vec::new();
        self.validator.validate_session_id(session_id.as_str(), &mut errors);
        self.validator.validate_total_chunks(total_chunks, &mut errors);
        Validator::to_validation_result(errors)?;

        self.status_registry.get_or_create(session_id, total_chunks)?;
        if let Some(name) = file_name {
            self.status_registry.set_file_name(session_id, name);
        }
        if let Some(size) = file_size {
            self.status_registry.set_file_size(session_id, size);
        }
        if let Some(size) = chunk_size {
            self.status_registry.set_chunk_size(session_id, size);
        }
        self.status_registry
            .get(session_id)
            .ok_or_else(|| UploadError::NotFound(session_id.to_string()))
    }

    pub fn get_status(&self, session_id: &SessionId) -> UploadResult<UploadSession> {
        self.status_registry
            .get(session_id)
            .ok_or_else(|| UploadError::NotFound(session_id.to_string()))
    }

    pub fn list_all(&self) -> Vec<UploadSession> {
        self.status_registry.list_all()
    }

    pub fn list_resumable(&self) -> Vec<UploadSession> {
        self.status_registry.list_resumable()
    }

    pub fn statistics(&self) -> crate::infrastructure::RegistryStatistics {
        self.status_registry.statistics()
    }

    /// Runs one cleanup sweep: removes terminal sessions older than `max_age` from the
    /// registry, and best-effort-removes any chunk-store directory for them. Invoked
    /// periodically by the background task in `main` (§10.5); also callable directly
    /// from tests.
    pub async fn run_cleanup_sweep(&self, max_age: chrono::Duration) -> usize {
        let removed = self.status_registry.cleanup(max_age);
        for id in &removed {
            self.chunk_store.cleanup(id).await;
        }
        if !removed.is_empty() {
            tracing::info!(sessions_removed = removed.len(), "cleanup sweep complete");
        }
        removed.len()
    }

    pub fn now() -> chrono::DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn coordinator(base: &std::path::Path) -> UploadCoordinator {
        let mut storage = StorageConfig::default();
        storage.base_dir = base.to_path_buf();
        UploadCoordinator::new(
            Arc::new(ChunkStore::new(&storage)),
            Arc::new(StatusRegistry::new()),
            Arc::new(Assembler::new(&storage)),
            Arc::new(Validator::new(storage)),
            10,
        )
    }

    fn cmd(session_id: &str, chunk_index: u64, total_chunks: u64, data: &[u8]) -> SaveChunkCommand {
        SaveChunkCommand {
            session_id: SessionId::new(session_id),
            chunk_index,
            total_chunks,
            data: bytes::Bytes::copy_from_slice(data),
            file_name: Some("hello.txt".to_string()),
            file_size: None,
            chunk_size: None,
        }
    }

    #[tokio::test]
    async fn happy_path_three_chunks_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let coord = coordinator(tmp.path());
        let id = SessionId::new("s1");

        coord.save_chunk(cmd("s1", 0, 3, b"Hello ")).await.unwrap();
        coord.save_chunk(cmd("s1", 1, 3, b"World ")).await.unwrap();
        coord.save_chunk(cmd("s1", 2, 3, b"!")).await.unwrap();

        let dest = coord.finalize(&id).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"Hello World !");
        assert!(coord.get_status(&id).is_err(), "session should be removed after finalize");
    }

    #[tokio::test]
    async fn out_of_order_submission_assembles_identically() {
        let tmp = tempfile::tempdir().unwrap();
        let coord = coordinator(tmp.path());
        let id = SessionId::new("s2");

        coord.save_chunk(cmd("s2", 2, 3, b"!")).await.unwrap();
        coord.save_chunk(cmd("s2", 0, 3, b"Hello ")).await.unwrap();
        coord.save_chunk(cmd("s2", 1, 3, b"World ")).await.unwrap();

        let dest = coord.finalize(&id).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"Hello World !");
    }

    #[tokio::test]
    async fn duplicate_chunk_does_not_double_count_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let coord = coordinator(tmp.path());
        let id = SessionId::new("s3");

        coord.save_chunk(cmd("s3", 0, 1, b"only-chunk")).await.unwrap();
        coord.save_chunk(cmd("s3", 0, 1, b"only-chunk")).await.unwrap();

        let status = coord.get_status(&id).unwrap();
        assert_eq!(status.uploaded_bytes, "only-chunk".len() as u64);
        assert_eq!(status.received_chunks.len(), 1);
    }

    #[tokio::test]
    async fn finalize_before_complete_reports_missing_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let coord = coordinator(tmp.path());
        let id = SessionId::new("s4");

        coord.save_chunk(cmd("s4", 0, 4, b"a")).await.unwrap();
        coord.save_chunk(cmd("s4", 2, 4, b"c")).await.unwrap();
        coord.save_chunk(cmd("s4", 3, 4, b"d")).await.unwrap();

        let err = coord.finalize(&id).await.unwrap_err();
        match err {
            UploadError::IncompleteUpload { missing } => assert_eq!(missing, vec![1]),
            other => panic!("expected IncompleteUpload, got {other:?}"),
        }
        assert!(coord.get_status(&id).is_ok(), "session remains active");
    }

    #[tokio::test]
    async fn finalize_called_twice_returns_not_found_the_second_time() {
        let tmp = tempfile::tempdir().unwrap();
        let coord = coordinator(tmp.path());
        let id = SessionId::new("s5");

        coord.save_chunk(cmd("s5", 0, 1, b"x")).await.unwrap();
        coord.finalize(&id).await.unwrap();

        let err = coord.finalize(&id).await.unwrap_err();
        assert!(matches!(err, UploadError::NotFound(_)));
    }

    #[tokio::test]
    async fn cancel_removes_artifacts_and_session() {
        let tmp = tempfile::tempdir().unwrap();
        let coord = coordinator(tmp.path());
        let id = SessionId::new("s6");

        coord.save_chunk(cmd("s6", 0, 2, b"a")).await.unwrap();
        coord.cancel(&id).await;

        assert!(coord.get_status(&id).is_err());
        assert!(!coord.chunk_store.exists(&id, 0).await);
    }

    #[tokio::test]
    async fn resume_handshake_reports_missing_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let coord = coordinator(tmp.path());
        let id = SessionId::new("s7");

        for i in 0..5u64 {
            coord.save_chunk(cmd("s7", i, 10, b"x")).await.unwrap();
        }

        let session = coord
            .resume_handshake(&id, 10, Some("hello.txt"), None, None)
            .unwrap();
        assert_eq!(session.missing_chunks(), vec![5, 6, 7, 8, 9]);
        assert_eq!(session.next_expected_chunk(), 5);
    }

    #[tokio::test]
    async fn resume_handshake_rejects_a_total_chunks_above_the_configured_ceiling() {
        let tmp = tempfile::tempdir().unwrap();
        let coord = coordinator(tmp.path());
        let id = SessionId::new("s9-fresh");

        let err = coord
            .resume_handshake(&id, u64::MAX, None, None, None)
            .unwrap_err();
        assert!(matches!(err, UploadError::Validation { .. }));
        assert!(coord.get_status(&id).is_err(), "a rejected handshake must not create a session");
    }

    #[tokio::test]
    async fn s6_disk_full_on_assembly_marks_session_failed_and_preserves_temp_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = StorageConfig::default();
        storage.base_dir = tmp.path().to_path_buf();

        // A separate, unreasonably strict floor for the assembler only: reproduces
        // "usable space below required" at finalize time without needing to actually
        // fill a disk (§8 S6), while chunk writes still succeed normally.
        let mut assembler_storage = storage.clone();
        assembler_storage.min_free_bytes = u64::MAX / 2;

        let coord = UploadCoordinator::new(
            Arc::new(ChunkStore::new(&storage)),
            Arc::new(StatusRegistry::new()),
            Arc::new(Assembler::new(&assembler_storage)),
            Arc::new(Validator::new(storage)),
            10,
        );
        let id = SessionId::new("s6");

        coord.save_chunk(cmd("s6", 0, 1, b"x")).await.unwrap();
        let err = coord.finalize(&id).await.unwrap_err();
        assert!(matches!(err, UploadError::InsufficientDiskSpace { .. }));

        let status = coord.get_status(&id).unwrap();
        assert_eq!(status.state, crate::domain::SessionState::Failed);
        assert!(coord.chunk_store.exists(&id, 0).await, "temp data preserved for post-mortem");
    }

    #[tokio::test]
    async fn reused_session_id_with_mismatched_total_chunks_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let coord = coordinator(tmp.path());

        coord.save_chunk(cmd("s8", 0, 5, b"a")).await.unwrap();
        let err = coord.save_chunk(cmd("s8", 0, 6, b"a")).await.unwrap_err();
        assert!(matches!(err, UploadError::Validation { .. }));
    }

    #[tokio::test]
    async fn save_chunk_is_shed_once_the_concurrency_ceiling_is_saturated() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = StorageConfig::default();
        storage.base_dir = tmp.path().to_path_buf();
        let coord = UploadCoordinator::new(
            Arc::new(ChunkStore::new(&storage)),
            Arc::new(StatusRegistry::new()),
            Arc::new(Assembler::new(&storage)),
            Arc::new(Validator::new(storage)),
            0,
        );

        let err = coord.save_chunk(cmd("s10", 0, 1, b"x")).await.unwrap_err();
        assert!(matches!(err, UploadError::TooManyConcurrentUploads));
    }
}
