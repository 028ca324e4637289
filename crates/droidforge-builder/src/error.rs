//! Error types for the builder.

use thiserror::Error;

/// Errors that can occur while building or placing an artifact.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// The build tool exited non-zero.
    #[error("build tool exited with status {code:?}")]
    ToolFailed { code: Option<i32> },

    /// The build tool exited zero but never printed its success marker.
    #[error("build output did not report success")]
    MarkerMissing,

    /// The tool reported success but no artifact exists on disk
    /// (typically a silent signing failure).
    #[error("build reported success but produced no artifact")]
    ArtifactMissing,

    /// Filesystem or spawn failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for builder operations.
pub type Result<T> = std::result::Result<T, BuilderError>;
