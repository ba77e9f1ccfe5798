//! Error types for the persistent cache

use std::path::PathBuf;

/// Errors during cache reads and writes
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// IO error on the backing store
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored entry could not be decoded
    #[error("corrupt cache entry {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

impl CacheError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create corrupt-entry error for path
    pub fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
