//! Configuration store for DroidForge.
//!
//! Persists one [`droidforge_models::BuildTarget`] record per chat as a JSON
//! file, written atomically (write to temp file, then rename) so a crash can
//! never leave a half-written record.
//!
//! # Example
//!
//! ```no_run
//! use droidforge_persistence::TargetStore;
//!
//! let store = TargetStore::new("/home/user/.droidforge");
//! let repo = "octo/demo".parse().unwrap();
//! store.set_repo(-100123, repo).unwrap();
//!
//! let target = store.load(-100123).unwrap().unwrap();
//! assert_eq!(target.repo.unwrap().name(), "demo");
//! ```

pub mod error;
pub mod target_store;

pub use error::{PersistenceError, Result};
pub use target_store::TargetStore;
