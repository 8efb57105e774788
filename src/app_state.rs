//! Application state for the upload receiver.
//!
//! Follows the teacher's composition-root pattern (`AppState` holding ports, built once
//! at startup and cloned into every handler) collapsed to the single coordinator this
//! engine needs — there is no second implementation to inject behind a trait object
//! here, so `AppState` holds the concrete [`UploadCoordinator`] rather than a `dyn`
//! port.

use std::sync::Arc;

use crate::config::Config;
use crate::coordinator::UploadCoordinator;
use crate::infrastructure::{Assembler, ChunkStore, StatusRegistry, Validator};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: UploadCoordinator,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let chunk_store = Arc::new(ChunkStore::new(&config.storage));
        let status_registry = Arc::new(StatusRegistry::new());
        let assembler = Arc::new(Assembler::new(&config.storage));
        let validator = Arc::new(Validator::new(config.storage.clone()));

        let coordinator = UploadCoordinator::new(
            chunk_store,
            status_registry,
            assembler,
            validator,
            config.server.max_concurrent_uploads,
        );

        Self {
            coordinator,
            config: Arc::new(config),
        }
    }
}
