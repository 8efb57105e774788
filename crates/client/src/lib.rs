//! Resumable chunked-file-upload client: slicer, retry policy, concurrent chunk pump,
//! session registry, and refresh bridge (§2 "Client uploader").

pub mod config;
pub mod error;
pub mod events;
pub mod pump;
pub mod refresh_bridge;
pub mod retry;
pub mod session;
pub mod slicer;
pub mod transport;
pub mod uploader;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use uploader::{TransportKind, Uploader};
