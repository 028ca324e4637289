//! Build orchestration workflow for DroidForge.
//!
//! The [`BuildOrchestrator`] decides whether a build is needed, sequences
//! sync -> build -> locate, keeps the persisted revision up to date, and
//! reports progress through a callback the chat gateway renders as
//! message edits.
//!
//! # Example
//!
//! ```ignore
//! use droidforge_orchestrator::{BuildOrchestrator, NullProgress};
//!
//! # async fn example(orchestrator: BuildOrchestrator) -> droidforge_orchestrator::Result<()> {
//! let attempt = orchestrator.run_build(-100123, false, &NullProgress).await?;
//! if attempt.outcome.is_success() {
//!     println!("APK ready");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod orchestrator;

pub use error::{OrchestratorError, Result};
pub use orchestrator::{ApkBuilder, BuildOrchestrator, BuildProgress, NullProgress, RepoSyncer};

// Re-export the attempt types gateways consume.
pub use droidforge_models::{BuildAttempt, BuildFailure, BuildOutcome, BuildPhase};
