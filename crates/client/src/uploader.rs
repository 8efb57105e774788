//! Top-level client facade: wires together the slicer, transport, retry policy, pump,
//! session registry, and refresh bridge behind one entry point, grounded on the
//! teacher-pack's `quanac-lcx-cr-desktop/src/uploader/mod.rs` composition style.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use shared::SessionId;
use tokio::sync::Mutex;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{event_channel, EventReceiver, EventSender};
use crate::pump::ChunkPump;
use crate::refresh_bridge::RefreshBridge;
use crate::session::{ClientSessionRegistry, UploadTask};
use crate::slicer;
use crate::transport::{BinarySender, ChunkSender, ControlClient, MultipartSender};

pub enum TransportKind {
    Multipart,
    Binary,
}

pub struct Uploader {
    config: ClientConfig,
    registry: Arc<ClientSessionRegistry>,
    pump: Arc<ChunkPump>,
    bridge: RefreshBridge,
    control: Arc<ControlClient>,
    events: EventSender,
}

impl Uploader {
    pub fn new(config: ClientConfig, transport: TransportKind) -> ClientResult<(Self, EventReceiver)> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let sender: Arc<dyn ChunkSender> = match transport {
            TransportKind::Multipart => Arc::new(MultipartSender::new(http.clone())),
            TransportKind::Binary => Arc::new(BinarySender::new(http.clone())),
        };
        let control = Arc::new(ControlClient::new(http));
        let (tx, rx) = event_channel();
        let bridge_path = crate::refresh_bridge::default_path(&config.app_name)?;

        let pump = Arc::new(ChunkPump::new(config.clone(), sender, control.clone(), tx.clone()));

        Ok((
            Self {
                config,
                registry: Arc::new(ClientSessionRegistry::new()),
                pump,
                bridge: RefreshBridge::new(bridge_path),
                control,
                events: tx,
            },
            rx,
        ))
    }

    /// Begins uploading `file_path` under a freshly generated session id.
    pub async fn upload_file(
        &self,
        file_path: PathBuf,
        file_name: Option<String>,
    ) -> ClientResult<SessionId> {
        let metadata = tokio::fs::metadata(&file_path).await?;
        let file_size = metadata.len();
        let ranges = slicer::plan(file_size, self.config.chunk_size);
        let total_chunks = ranges.len() as u64;

        let session_id = SessionId::generate();
        let task = UploadTask::new(
            session_id.clone(),
            file_path,
            file_name,
            file_size,
            self.config.chunk_size,
            total_chunks,
            Utc::now(),
        );
        let handle = self.registry.insert(task);
        self.pump.start(handle).await;
        Ok(session_id)
    }

    /// Reattaches to a session the refresh bridge remembered from a prior process,
    /// re-querying the server for its authoritative state before resuming (§8 S3).
    pub async fn reattach(&self, file_path: PathBuf) -> ClientResult<Vec<SessionId>> {
        let remembered = self.bridge.read(Utc::now()).await?;
        let mut reattached = Vec::new();

        for session_id in remembered {
            let record = self
                .control
                .status(&self.config.base_url, &session_id)
                .await?;
            let mut task = UploadTask::new(
                session_id.clone(),
                file_path.clone(),
                record.file_name.clone(),
                record.file_size.unwrap_or(0),
                record.chunk_size.unwrap_or(self.config.chunk_size),
                record.total_chunks,
                record.created_at,
            );
            task.received_chunks = record.received_chunks.into_iter().collect();
            task.uploaded_bytes = record.uploaded_bytes;

            let handle = self.registry.insert(task);
            if record.can_resume {
                self.pump.resume(handle).await;
            }
            reattached.push(session_id);
        }
        Ok(reattached)
    }

    pub async fn pause(&self, session_id: &SessionId) -> ClientResult<()> {
        let task = self.session(session_id)?;
        self.pump.pause(&task).await;
        self.persist_active_sessions().await
    }

    pub async fn resume(&self, session_id: &SessionId) -> ClientResult<()> {
        let task = self.session(session_id)?;
        self.pump.resume(task).await;
        Ok(())
    }

    pub async fn cancel(&self, session_id: &SessionId) -> ClientResult<()> {
        let task = self.session(session_id)?;
        self.pump.cancel(task).await;
        self.registry.remove(session_id);
        Ok(())
    }

    /// Writes the refresh bridge file with every currently active session id (§10.7);
    /// call on orderly shutdown in addition to every pause.
    pub async fn persist_active_sessions(&self) -> ClientResult<()> {
        let active = self.registry.active_session_ids().await;
        self.bridge.write(&active, Utc::now()).await
    }

    fn session(&self, session_id: &SessionId) -> ClientResult<Arc<Mutex<UploadTask>>> {
        self.registry
            .get(session_id)
            .ok_or_else(|| ClientError::UnknownSession(session_id.to_string()))
    }
}
