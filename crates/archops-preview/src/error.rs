//! Error types for preview rendering

use std::path::PathBuf;

/// Preview failures
///
/// Render failures are reported to the host as a notification and never
/// replace content already on the surface.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    /// The authoring engine failed to translate or lay out a view
    #[error("diagram engine failed: {0}")]
    Engine(String),

    /// Local graph layout failed
    #[error("layout failed: {0}")]
    Layout(String),

    /// The preview surface is gone or sent something unexpected
    #[error("preview surface error: {0}")]
    Surface(String),

    /// The configured backend cannot export
    #[error("export is not supported by the {0} backend")]
    ExportUnsupported(&'static str),

    /// No panel is showing a diagram
    #[error("no preview is open")]
    NoActivePanel,

    /// The shown diagram changed or closed while an export was pending
    #[error("preview changed before the export completed")]
    ExportSuperseded,

    /// The surface did not answer in time
    #[error("preview surface did not answer within {0} seconds")]
    Timeout(u64),

    /// Writing an export failed
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PreviewError {
    /// Create engine error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }

    /// Create layout error
    pub fn layout(message: impl Into<String>) -> Self {
        Self::Layout(message.into())
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for preview operations
pub type PreviewResult<T> = Result<T, PreviewError>;
