//! Transport strategies (§9 "Polymorphism over transport"): the pump is parametric over
//! a `ChunkSender` capability so it does not know whether chunks travel as multipart
//! form parts or raw binary bodies.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use shared::{ResumeRecord, SessionId};
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, ClientResult};

/// One chunk, fully described, ready to send (§4.1: `{sessionId, chunkIndex,
/// totalChunks, fileName}` plus the bytes).
pub struct OutboundChunk {
    pub session_id: SessionId,
    pub chunk_index: u64,
    pub total_chunks: u64,
    pub file_name: Option<String>,
    pub data: Bytes,
}

#[async_trait]
pub trait ChunkSender: Send + Sync {
    async fn send(
        &self,
        base_url: &str,
        chunk: OutboundChunk,
        cancellation: &CancellationToken,
    ) -> ClientResult<()>;
}

async fn run_cancellable<T>(
    cancellation: &CancellationToken,
    fut: impl std::future::Future<Output = reqwest::Result<T>>,
) -> ClientResult<T> {
    tokio::select! {
        result = fut => Ok(result?),
        _ = cancellation.cancelled() => Err(ClientError::Cancelled),
    }
}

/// Submits chunks as `multipart/form-data` to `POST /upload` (§6).
pub struct MultipartSender {
    client: Client,
}

impl MultipartSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChunkSender for MultipartSender {
    async fn send(
        &self,
        base_url: &str,
        chunk: OutboundChunk,
        cancellation: &CancellationToken,
    ) -> ClientResult<()> {
        let mut form = reqwest::multipart::Form::new()
            .text("sessionId", chunk.session_id.into_string())
            .text("chunkIndex", chunk.chunk_index.to_string())
            .text("totalChunks", chunk.total_chunks.to_string())
            .part("file", reqwest::multipart::Part::bytes(chunk.data.to_vec()));
        if let Some(name) = chunk.file_name {
            form = form.text("fileName", name);
        }

        let request = self
            .client
            .post(format!("{base_url}/upload"))
            .multipart(form)
            .send();

        let response = run_cancellable(cancellation, request).await?;
        check_status(response).await
    }
}

/// Submits chunks as raw binary bodies to `POST /upload/binary` (§6).
pub struct BinarySender {
    client: Client,
}

impl BinarySender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChunkSender for BinarySender {
    async fn send(
        &self,
        base_url: &str,
        chunk: OutboundChunk,
        cancellation: &CancellationToken,
    ) -> ClientResult<()> {
        let mut request = self
            .client
            .post(format!("{base_url}/upload/binary"))
            .header("X-File-Id", chunk.session_id.as_str())
            .header("X-Chunk-Number", chunk.chunk_index.to_string())
            .header("X-Total-Chunks", chunk.total_chunks.to_string());
        if let Some(name) = &chunk.file_name {
            request = request.header("X-File-Name", name.as_str());
        }

        let request = request.body(chunk.data).send();
        let response = run_cancellable(cancellation, request).await?;
        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> ClientResult<()> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(ClientError::Server { status, message })
}

/// The resume handshake and finalize/cancel/status calls, kept apart from
/// [`ChunkSender`] since they are transport-agnostic (one call each, no strategy).
pub struct ControlClient {
    client: Client,
}

impl ControlClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn resume_handshake(
        &self,
        base_url: &str,
        session_id: &SessionId,
        total_chunks: u64,
        file_name: Option<&str>,
        file_size: Option<u64>,
        chunk_size: Option<u64>,
    ) -> ClientResult<ResumeRecord> {
        let mut query = vec![("totalChunks".to_string(), total_chunks.to_string())];
        if let Some(name) = file_name {
            query.push(("fileName".to_string(), name.to_string()));
        }
        if let Some(size) = file_size {
            query.push(("fileSize".to_string(), size.to_string()));
        }
        if let Some(size) = chunk_size {
            query.push(("chunkSize".to_string(), size.to_string()));
        }

        let response = self
            .client
            .post(format!("{base_url}/upload/{session_id}/resume"))
            .query(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Server {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    pub async fn finalize(&self, base_url: &str, session_id: &SessionId) -> ClientResult<()> {
        let response = self
            .client
            .post(format!("{base_url}/upload/{session_id}/complete"))
            .send()
            .await?;
        check_status(response).await
    }

    pub async fn cancel(&self, base_url: &str, session_id: &SessionId) -> ClientResult<()> {
        let response = self
            .client
            .delete(format!("{base_url}/upload/{session_id}"))
            .send()
            .await?;
        check_status(response).await
    }

    pub async fn status(&self, base_url: &str, session_id: &SessionId) -> ClientResult<ResumeRecord> {
        let response = self
            .client
            .get(format!("{base_url}/upload/{session_id}"))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Server {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}
