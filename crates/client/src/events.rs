//! The pump-to-presentation channel (§9 "Background observables and reactive streams"):
//! a bounded channel of `(sessionId, event)` tuples stands in for the source's observable
//! sequences, since the reactive abstraction itself is not part of the contract.

use shared::SessionId;

#[derive(Debug, Clone)]
pub enum UploadEvent {
    Started,
    ChunkCompleted {
        chunk_index: u64,
        uploaded_bytes: u64,
        total_chunks: u64,
        speed_bytes_per_sec: Option<f64>,
        remaining_seconds: Option<f64>,
    },
    Paused,
    Resumed,
    Completing,
    Completed,
    Failed {
        message: String,
    },
    Cancelled,
}

pub type EventSender = tokio::sync::mpsc::Sender<(SessionId, UploadEvent)>;
pub type EventReceiver = tokio::sync::mpsc::Receiver<(SessionId, UploadEvent)>;

/// Default channel capacity; a slow or absent presentation layer can't block the pump
/// indefinitely since chunk dispatch is what matters, not event delivery.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

pub fn event_channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::channel(EVENT_CHANNEL_CAPACITY)
}
