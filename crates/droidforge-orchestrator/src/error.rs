//! Error types for the orchestrator.

use thiserror::Error;

/// Infrastructure errors the orchestrator cannot convert into a typed
/// build failure. Collaborator failures (sync, build, locate) never show
/// up here; they become [`droidforge_models::BuildFailure`] outcomes.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The configuration store failed.
    #[error("Store error: {0}")]
    Store(#[from] droidforge_persistence::PersistenceError),
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
