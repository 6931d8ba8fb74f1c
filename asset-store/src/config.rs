use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_CHUNK_BYTES: usize = 1_900_000;
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 2_000_000;
pub const DEFAULT_BATCH_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_LIVE_BATCHES: usize = 10_000;

/// Limits and storage settings for the asset store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Largest accepted chunk upload.
    pub max_chunk_bytes: usize,

    /// Bodies up to this size are answered in a single response; larger ones are paged.
    pub max_response_bytes: usize,

    /// How long a batch stays alive after its last init or upload.
    pub batch_ttl: Duration,

    /// Upper bound on concurrently open batches.
    pub max_live_batches: usize,

    /// Directory for buffered chunk bytes. `None` keeps them in memory.
    pub chunk_dir: Option<PathBuf>,

    /// Service name advertised in streaming callbacks.
    pub callback_service: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            batch_ttl: DEFAULT_BATCH_TTL,
            max_live_batches: DEFAULT_MAX_LIVE_BATCHES,
            chunk_dir: None,
            callback_service: "asset-store".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("Failed to prepare chunk directory")]
    ChunkDir(#[from] std::io::Error),
}

impl StoreConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.max_chunk_bytes == 0 {
            return Err(ConfigError::Zero("max_chunk_bytes"));
        }
        if self.max_response_bytes == 0 {
            return Err(ConfigError::Zero("max_response_bytes"));
        }
        if self.batch_ttl.is_zero() {
            return Err(ConfigError::Zero("batch_ttl"));
        }
        if self.max_live_batches == 0 {
            return Err(ConfigError::Zero("max_live_batches"));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = StoreConfig::default().validate().unwrap();
        assert_eq!(config.max_chunk_bytes, DEFAULT_MAX_CHUNK_BYTES);
        assert!(config.chunk_dir.is_none());
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let config = StoreConfig {
            max_chunk_bytes: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "max_chunk_bytes must be greater than zero");

        let config = StoreConfig {
            batch_ttl: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero("batch_ttl"))));
    }
}
