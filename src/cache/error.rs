//! Cache error taxonomy.
//!
//! Corrupted entries never show up here: backends treat them as misses.

use std::path::PathBuf;
use thiserror::Error;

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache key cannot be empty")]
    InvalidKey,

    #[error("response cannot be null")]
    NullResponse,

    #[error("unsupported response type: {type_name}")]
    UnsupportedType { type_name: String },

    #[error("invalid cache configuration for '{field}': {message}")]
    InvalidConfiguration {
        field: &'static str,
        message: String,
    },

    #[error("response too large for cache: {size} bytes (max: {max} bytes)")]
    ResponseTooLarge { size: usize, max: u64 },

    #[error("failed to write cache file {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode cache entry: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub(crate) fn invalid_config(field: &'static str, message: impl Into<String>) -> Self {
        CacheError::InvalidConfiguration {
            field,
            message: message.into(),
        }
    }

    /// Validation failures indicate a programming or configuration mistake
    /// rather than an environmental problem.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CacheError::InvalidKey
                | CacheError::NullResponse
                | CacheError::UnsupportedType { .. }
                | CacheError::InvalidConfiguration { .. }
                | CacheError::ResponseTooLarge { .. }
        )
    }
}
