//! Build attempt results.
//!
//! A [`BuildAttempt`] is ephemeral: it is constructed per command
//! invocation, handed to the chat gateway for rendering, and discarded.
//! Only the revision of a successful attempt survives into the persisted
//! [`crate::BuildTarget`].

use std::path::PathBuf;

use thiserror::Error;

/// Phases of a build attempt, in execution order.
///
/// The orchestrator reports each phase through its progress callback just
/// before the phase starts; the gateway renders them as sequential edits of
/// the same status message, so they must never be reordered or coalesced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// Cloning or pulling the repository.
    Syncing,
    /// Running the Gradle release build.
    Building,
    /// Placing and delivering the artifact.
    Sending,
}

/// Why a build attempt failed.
///
/// Every collaborator error is converted into one of these before it
/// reaches the gateway; the `Display` text is user-facing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildFailure {
    /// No repository has been configured for this chat.
    #[error("No repo set. Set a repo using /setrepo first")]
    NoRepoConfigured,

    /// Another build for the same chat is still running.
    #[error("A build is already running for this chat")]
    InProgress,

    /// The remote rejected our git credentials.
    #[error("Git Authentication error")]
    SyncAuth,

    /// The remote repository does not exist or is inaccessible.
    #[error("Repo not found! Check your remote repository and try again!")]
    SyncNotFound,

    /// Any other sync failure, including a failed pull.
    #[error("Repo sync failed: {0}")]
    SyncOther(String),

    /// The build tool failed, or reported success without producing an
    /// artifact. The captured error log lives at `log`.
    #[error("Building apk failed")]
    Build {
        /// Path to the captured build log.
        log: PathBuf,
    },
}

impl BuildFailure {
    /// Whether the failure produced a log worth offering to the user.
    pub fn log(&self) -> Option<&PathBuf> {
        match self {
            BuildFailure::Build { log } => Some(log),
            _ => None,
        }
    }
}

/// Terminal outcome of one build attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The latest revision was already built; no sync or build work was
    /// performed. `artifact` is the deterministic path the existing APK
    /// would live at, for re-delivery on request.
    Skipped { revision: String, artifact: PathBuf },

    /// Sync, build and locate all succeeded.
    Success { revision: String, artifact: PathBuf },

    /// The attempt failed; see [`BuildFailure`].
    Failed(BuildFailure),
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, BuildOutcome::Skipped { .. })
    }
}

/// One ephemeral build run for a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildAttempt {
    /// Chat whose target was built.
    pub chat_id: i64,
    /// Whether the staleness check was bypassed.
    pub forced: bool,
    /// How the attempt ended.
    pub outcome: BuildOutcome,
}
