//! Refresh bridge (§6, supplemented at §10.7): persists active session ids across a
//! client restart. A browser tab has `sessionStorage`; this is a native client, so the
//! equivalent is a small JSON file under the OS cache directory, written whenever a
//! task pauses or the process shuts down in an orderly fashion, and read at startup.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::SessionId;

use crate::error::{ClientError, ClientResult};

/// Entries older than this are discarded at read time (§6).
pub const STALE_AFTER_SECS: i64 = 5 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct BridgeFile {
    entries: Vec<BridgeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BridgeEntry {
    session_id: SessionId,
    written_at: DateTime<Utc>,
}

/// Locates `$XDG_CACHE_HOME/<app>/sessions.json` (or the platform equivalent via the
/// `dirs` crate) for the given app name.
pub fn default_path(app_name: &str) -> ClientResult<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| ClientError::RefreshBridge("no OS cache directory available".to_string()))?;
    Ok(cache_dir.join(app_name).join("sessions.json"))
}

pub struct RefreshBridge {
    path: PathBuf,
}

impl RefreshBridge {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Overwrites the bridge file with exactly `session_ids`, stamped with the current
    /// time. Called when a task transitions to `Paused` or on orderly shutdown (§10.7).
    pub async fn write(&self, session_ids: &[SessionId], now: DateTime<Utc>) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ClientError::RefreshBridge(format!("create cache dir: {e}")))?;
        }
        let file = BridgeFile {
            entries: session_ids
                .iter()
                .map(|id| BridgeEntry {
                    session_id: id.clone(),
                    written_at: now,
                })
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| ClientError::RefreshBridge(format!("serialize: {e}")))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| ClientError::RefreshBridge(format!("write {}: {e}", self.path.display())))?;
        Ok(())
    }

    /// Reads session ids written less than [`STALE_AFTER_SECS`] ago; a missing file or a
    /// fully-stale file both yield an empty list rather than an error.
    pub async fn read(&self, now: DateTime<Utc>) -> ClientResult<Vec<SessionId>> {
        read_at(&self.path, now).await
    }
}

async fn read_at(path: &Path, now: DateTime<Utc>) -> ClientResult<Vec<SessionId>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ClientError::RefreshBridge(format!("read {}: {e}", path.display()))),
    };
    let file: BridgeFile = serde_json::from_slice(&bytes)
        .map_err(|e| ClientError::RefreshBridge(format!("parse {}: {e}", path.display())))?;

    Ok(file
        .entries
        .into_iter()
        .filter(|entry| (now - entry.written_at).num_seconds() < STALE_AFTER_SECS)
        .map(|entry| entry.session_id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn round_trips_fresh_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let bridge = RefreshBridge::new(tmp.path().join("sessions.json"));
        let now = Utc::now();

        bridge.write(&[SessionId::new("s1"), SessionId::new("s2")], now).await.unwrap();
        let ids = bridge.read(now).await.unwrap();
        assert_eq!(ids, vec![SessionId::new("s1"), SessionId::new("s2")]);
    }

    #[tokio::test]
    async fn discards_entries_older_than_five_minutes() {
        let tmp = tempfile::tempdir().unwrap();
        let bridge = RefreshBridge::new(tmp.path().join("sessions.json"));
        let written_at = Utc::now() - Duration::seconds(10);

        bridge.write(&[SessionId::new("s1")], written_at).await.unwrap();
        let ids = bridge.read(written_at + Duration::seconds(301)).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let bridge = RefreshBridge::new(tmp.path().join("never-written.json"));
        assert!(bridge.read(Utc::now()).await.unwrap().is_empty());
    }
}
