//! Error types for catalog access
//!
//! [`FetchError`] never crosses the [`CatalogFetcher`](crate::CatalogFetcher)
//! boundary for expected failures; it only drives the cache fallback and the
//! log line explaining it.

use archops_auth::SignError;
use std::path::PathBuf;

/// Transport-level failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Request could not be built or sent
    #[error("request failed: {0}")]
    Request(String),

    /// Transport timeout elapsed
    #[error("request timed out")]
    Timeout,
}

/// Why a single network attempt did not produce a usable payload
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network unreachable, timeout, refused connection
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Non-2xx response
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// Body is not valid for the expected schema
    #[error("decode failure: {0}")]
    Decode(String),

    /// Request could not be signed
    #[error("signing failed: {0}")]
    Sign(#[from] SignError),
}

impl FetchError {
    /// Create decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Whether the failure came from the payload rather than the network
    #[inline]
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Errors surfaced by catalog actions that touch the workspace
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// HTTP client could not be constructed
    #[error("transport setup failed: {0}")]
    Setup(String),

    /// Writing an artifact into the workspace failed
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CatalogError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
