//! Core data models for DroidForge.
//!
//! These types are shared across the persistence, orchestration and
//! Telegram layers:
//!
//! - [`RepoRef`] - an `owner/name` GitHub repository reference
//! - [`BuildTarget`] - one chat's persisted build configuration
//! - [`BuildAttempt`] / [`BuildOutcome`] - the result of a single build run

pub mod attempt;
pub mod repo;
pub mod target;

pub use attempt::{BuildAttempt, BuildFailure, BuildOutcome, BuildPhase};
pub use repo::{GitCredentials, RepoRef, RepoRefError};
pub use target::BuildTarget;
