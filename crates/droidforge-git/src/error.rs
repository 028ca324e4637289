//! Error types for repository sync.

use thiserror::Error;

/// Errors that can occur while syncing a repository.
#[derive(Debug, Error)]
pub enum GitError {
    /// The remote rejected our credentials.
    #[error("git authentication failed")]
    AuthFailed,

    /// The remote repository does not exist or is inaccessible.
    #[error("remote repository not found")]
    NotFound,

    /// A git command exited non-zero for any other reason.
    #[error("git command failed: {0}")]
    Command(String),

    /// The git binary could not be spawned.
    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, GitError>;
