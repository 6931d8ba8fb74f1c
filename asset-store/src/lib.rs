#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;

use crate::app::App;
use crate::config::{ConfigError, StoreConfig};

pub mod app;
pub mod config;
pub mod network;
pub mod store;

pub mod typ {
    pub type BatchId = u64;
    pub type ChunkId = u64;
    pub type FullPath = String;

    /// A `(name, value)` header pair. Lists of them keep order and duplicates.
    pub type HeaderField = (String, String);
}

/// Validates the configuration and builds the shared service state.
pub fn start_asset_store(config: StoreConfig) -> Result<Arc<App>, ConfigError> {
    let app = App::new(config)?;
    tracing::info!(
        "asset store ready: max_chunk_bytes={}, max_response_bytes={}, batch_ttl={:?}",
        app.config.max_chunk_bytes,
        app.config.max_response_bytes,
        app.config.batch_ttl
    );
    Ok(Arc::new(app))
}
