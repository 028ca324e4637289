//! Repository sync for DroidForge.
//!
//! Drives the `git` CLI to keep a local working copy of the configured
//! remote up to date, and reads the short revision of the local HEAD.
//! A pull failure fails the whole sync; the stale working copy is never
//! built.

pub mod error;
pub mod sync;

pub use error::{GitError, Result};
pub use sync::GitSync;
