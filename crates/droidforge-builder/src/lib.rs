//! Artifact builder and locator for DroidForge.
//!
//! [`GradleBuilder`] runs the repository's own `gradlew` wrapper and
//! captures its error output; the [`locator`] module computes the
//! deterministic revision-tagged destination every built APK is moved to.

pub mod error;
pub mod gradle;
pub mod locator;

pub use error::{BuilderError, Result};
pub use gradle::GradleBuilder;
pub use locator::{artifact_destination, log_path, place_artifact};
