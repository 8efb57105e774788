//! The chunk pump (§4.1): dispatches missing chunks with bounded concurrency, applies
//! the retry policy per chunk, and reports progress.
//!
//! Concurrency follows the teacher's own worker-pool pattern
//! (`policies::shared::application::parallel::evaluate_scenarios_channel`): a bounded
//! mpsc channel of chunk ranges feeds a fixed number of workers, a second channel
//! collects outcomes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use shared::SessionId;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{EventSender, UploadEvent};
use crate::session::{TaskState, UploadTask};
use crate::slicer::{self, ChunkRange};
use crate::transport::{ChunkSender, ControlClient, OutboundChunk};

struct ChunkOutcome {
    index: u64,
    result: ClientResult<u64>,
}

pub struct ChunkPump {
    config: ClientConfig,
    sender: Arc<dyn ChunkSender>,
    control: Arc<ControlClient>,
    events: EventSender,
}

impl ChunkPump {
    pub fn new(config: ClientConfig, sender: Arc<dyn ChunkSender>, control: Arc<ControlClient>, events: EventSender) -> Self {
        Self {
            config,
            sender,
            control,
            events,
        }
    }

    /// `start(task)` (§4.1): idempotent — a task already `Uploading` or `Completing` is
    /// left alone.
    pub async fn start(&self, task: Arc<Mutex<UploadTask>>) {
        {
            let mut guard = task.lock().await;
            if matches!(guard.state, TaskState::Uploading | TaskState::Completing) {
                return;
            }
            guard.state = TaskState::Uploading;
        }
        let session_id = task.lock().await.session_id.clone();
        let _ = self.events.send((session_id, UploadEvent::Started)).await;
        self.run_dispatch_loop(task).await;
    }

    /// `pause(id)` (§4.1): halts dispatch of further chunks and requests cooperative
    /// cancellation of whatever chunk sends are in flight.
    pub async fn pause(&self, task: &Arc<Mutex<UploadTask>>) {
        let mut guard = task.lock().await;
        if guard.state == TaskState::Uploading {
            guard.state = TaskState::Paused;
        }
        guard.cancellation.cancel();
        let session_id = guard.session_id.clone();
        drop(guard);
        let _ = self.events.send((session_id, UploadEvent::Paused)).await;
    }

    /// `resume(id)` (§4.1): re-queries the server for the authoritative missing-chunk
    /// set before re-entering dispatch, since the pause may have spanned a restart.
    /// A `CancellationToken` is one-shot, so `pause`'s cancelled token is replaced with
    /// a fresh one rather than reused.
    pub async fn resume(&self, task: Arc<Mutex<UploadTask>>) {
        let (session_id, total_chunks, file_name) = {
            let guard = task.lock().await;
            (guard.session_id.clone(), guard.total_chunks, guard.file_name.clone())
        };

        let record = match self.control.status(&self.config.base_url, &session_id).await {
            Ok(record) => Some(record),
            Err(_) => self
                .control
                .resume_handshake(&self.config.base_url, &session_id, total_chunks, file_name.as_deref(), None, None)
                .await
                .ok(),
        };
        if let Some(record) = record {
            let mut guard = task.lock().await;
            guard.received_chunks = record.received_chunks.into_iter().collect();
            guard.uploaded_bytes = record.uploaded_bytes;
        }

        {
            let mut guard = task.lock().await;
            guard.cancellation = CancellationToken::new();
            guard.state = TaskState::Uploading;
        }
        let _ = self.events.send((session_id, UploadEvent::Resumed)).await;
        self.run_dispatch_loop(task).await;
    }

    /// `cancel(id)` (§4.1): aborts in-flight requests cooperatively, deletes the server
    /// session, and marks the task `Cancelled`. Idempotent.
    pub async fn cancel(&self, task: Arc<Mutex<UploadTask>>) {
        let session_id = {
            let mut guard = task.lock().await;
            guard.cancellation.cancel();
            guard.state = TaskState::Cancelled;
            guard.session_id.clone()
        };
        let _ = self.control.cancel(&self.config.base_url, &session_id).await;
        let _ = self.events.send((session_id, UploadEvent::Cancelled)).await;
    }

    async fn run_dispatch_loop(&self, task: Arc<Mutex<UploadTask>>) {
        loop {
            let (session_id, missing, chunk_size, file_size, total_chunks, file_path, file_name, cancellation) = {
                let guard = task.lock().await;
                if guard.state != TaskState::Uploading {
                    return;
                }
                (
                    guard.session_id.clone(),
                    guard.missing_chunks(),
                    guard.chunk_size,
                    guard.file_size,
                    guard.total_chunks,
                    guard.file_path.clone(),
                    guard.file_name.clone(),
                    guard.cancellation.clone(),
                )
            };

            if missing.is_empty() {
                break;
            }

            let ranges: Vec<ChunkRange> = slicer::plan(file_size, chunk_size)
                .into_iter()
                .filter(|r| missing.contains(&r.index))
                .collect();

            let outcome = self
                .dispatch_round(&session_id, ranges, total_chunks, &file_path, file_name.as_deref(), &task, &cancellation)
                .await;

            match outcome {
                Ok(()) => continue,
                Err(err) => {
                    let mut guard = task.lock().await;
                    guard.state = TaskState::Failed;
                    drop(guard);
                    let _ = self
                        .events
                        .send((session_id, UploadEvent::Failed { message: err.to_string() }))
                        .await;
                    return;
                }
            }
        }

        self.finalize(task).await;
    }

    async fn dispatch_round(
        &self,
        session_id: &SessionId,
        ranges: Vec<ChunkRange>,
        total_chunks: u64,
        file_path: &PathBuf,
        file_name: Option<&str>,
        task: &Arc<Mutex<UploadTask>>,
        cancellation: &tokio_util::sync::CancellationToken,
    ) -> ClientResult<()> {
        let (work_tx, work_rx) = mpsc::channel::<ChunkRange>(ranges.len().max(1));
        let (result_tx, mut result_rx) = mpsc::channel::<ChunkOutcome>(ranges.len().max(1));
        let work_rx = Arc::new(Mutex::new(work_rx));

        for range in &ranges {
            if work_tx.send(*range).await.is_err() {
                break;
            }
        }
        drop(work_tx);

        let workers = self.config.max_concurrent_chunks.min(ranges.len().max(1));
        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let sender = self.sender.clone();
            let base_url = self.config.base_url.clone();
            let retry = self.config.retry.clone();
            let session_id = session_id.clone();
            let file_path = file_path.clone();
            let file_name = file_name.map(str::to_string);
            let cancellation = cancellation.clone();

            tokio::spawn(async move {
                loop {
                    let range_opt = { work_rx.lock().await.recv().await };
                    let Some(range) = range_opt else { break };
                    let result = send_chunk_with_retry(
                        &sender, &base_url, &session_id, range, total_chunks, file_name.as_deref(), &file_path, &retry, &cancellation,
                    )
                    .await;
                    let outcome = ChunkOutcome {
                        index: range.index,
                        result: result.map(|()| range.len()),
                    };
                    if result_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let mut remaining = ranges.len();
        while remaining > 0 {
            let Some(outcome) = result_rx.recv().await else { break };
            remaining -= 1;
            match outcome.result {
                Ok(bytes) => {
                    let (uploaded_bytes, speed, remaining_time) = {
                        let mut guard = task.lock().await;
                        guard.received_chunks.insert(outcome.index);
                        guard.uploaded_bytes += bytes;
                        guard.last_updated_at = Utc::now();
                        let now = Utc::now();
                        (guard.uploaded_bytes, guard.upload_speed(now), guard.estimated_remaining_time(now))
                    };
                    let _ = self
                        .events
                        .send((
                            session_id.clone(),
                            UploadEvent::ChunkCompleted {
                                chunk_index: outcome.index,
                                uploaded_bytes,
                                total_chunks,
                                speed_bytes_per_sec: speed,
                                remaining_seconds: remaining_time,
                            },
                        ))
                        .await;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn finalize(&self, task: Arc<Mutex<UploadTask>>) {
        let session_id = {
            let mut guard = task.lock().await;
            guard.state = TaskState::Completing;
            guard.session_id.clone()
        };
        let _ = self.events.send((session_id.clone(), UploadEvent::Completing)).await;

        match self.control.finalize(&self.config.base_url, &session_id).await {
            Ok(()) => {
                task.lock().await.state = TaskState::Completed;
                let _ = self.events.send((session_id, UploadEvent::Completed)).await;
            }
            Err(err) => {
                task.lock().await.state = TaskState::Failed;
                let _ = self
                    .events
                    .send((session_id, UploadEvent::Failed { message: err.to_string() }))
                    .await;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn send_chunk_with_retry(
    sender: &Arc<dyn ChunkSender>,
    base_url: &str,
    session_id: &SessionId,
    range: ChunkRange,
    total_chunks: u64,
    file_name: Option<&str>,
    file_path: &PathBuf,
    retry: &crate::retry::RetryPolicy,
    cancellation: &tokio_util::sync::CancellationToken,
) -> ClientResult<()> {
    let mut attempt = 0u32;
    loop {
        if cancellation.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let data = slicer::read_range(file_path, range).await?;
        let chunk = OutboundChunk {
            session_id: session_id.clone(),
            chunk_index: range.index,
            total_chunks,
            file_name: file_name.map(str::to_string),
            data,
        };

        match sender.send(base_url, chunk, cancellation).await {
            Ok(()) => return Ok(()),
            Err(err) if retry.is_retryable(&err) && attempt + 1 < retry.max_attempts => {
                let delay = retry.delay_for_attempt(attempt);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) if retry.is_retryable(&err) => {
                return Err(ClientError::RetriesExhausted {
                    chunk_index: range.index,
                    attempts: attempt + 1,
                    last_error: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }
}
