//! CLI error type.

use catalog_read::cache::CacheError;
use catalog_read::client::ApiError;
use catalog_read::config::ConfigError;
use catalog_read::logging::LoggingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("Request failed: {0}")]
    Request(#[from] ApiError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Prefetch failed: {0}")]
    Prefetch(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}
