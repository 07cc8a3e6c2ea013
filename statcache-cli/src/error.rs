//! Error types for the CLI.

use statcache_core::{ConfigError, EncodingError, StatCacheError};
use statcache_storage::LmdbStoreError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] LmdbStoreError),
    #[error(transparent)]
    Cache(#[from] StatCacheError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to initialize logging: {0}")]
    Telemetry(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
