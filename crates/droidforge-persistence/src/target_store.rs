//! Store for per-chat build targets.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use droidforge_models::{BuildTarget, RepoRef};
use tempfile::NamedTempFile;

use crate::error::{PersistenceError, Result};

/// Manages persistence of build targets.
///
/// Targets are stored as one JSON file per chat:
/// ```text
/// base_path/
/// └── targets/
///     ├── target-12345.json
///     └── target--10098765.json
/// ```
///
/// Every operation reads and writes independently; concurrent mutation of
/// the same target is prevented by the orchestrator's per-target
/// single-flight, not by file locking.
pub struct TargetStore {
    base_path: PathBuf,
}

impl TargetStore {
    /// Creates a new store rooted at the given base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn targets_dir(&self) -> PathBuf {
        self.base_path.join("targets")
    }

    fn target_path(&self, chat_id: i64) -> PathBuf {
        self.targets_dir().join(format!("target-{}.json", chat_id))
    }

    /// Loads the target for a chat, `None` if it was never configured.
    pub fn load(&self, chat_id: i64) -> Result<Option<BuildTarget>> {
        let path = self.target_path(chat_id);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)
            .map_err(|source| PersistenceError::ReadError { path, source })?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// Saves a target record.
    ///
    /// The record is staged as a temp file in the targets directory and
    /// renamed over the final path, so a crash mid-write can never leave a
    /// half-written record behind.
    pub fn save(&self, target: &BuildTarget) -> Result<()> {
        let dir = self.targets_dir();
        fs::create_dir_all(&dir).map_err(|source| PersistenceError::DirectoryError {
            path: dir.clone(),
            source,
        })?;

        let path = self.target_path(target.chat_id);
        let json = serde_json::to_vec_pretty(target)?;

        // Staged in the same directory so the rename stays on one filesystem
        let mut staged =
            NamedTempFile::new_in(&dir).map_err(|source| PersistenceError::WriteError {
                path: path.clone(),
                source,
            })?;
        staged
            .write_all(&json)
            .map_err(|source| PersistenceError::WriteError {
                path: path.clone(),
                source,
            })?;
        staged
            .persist(&path)
            .map_err(|e| PersistenceError::WriteError {
                path,
                source: e.error,
            })?;
        Ok(())
    }

    fn load_required(&self, chat_id: i64) -> Result<BuildTarget> {
        self.load(chat_id)?
            .ok_or(PersistenceError::NotFound { chat_id })
    }

    /// Sets (or replaces) the repository for a chat, creating the record on
    /// first use. Returns `true` when an existing record was updated.
    pub fn set_repo(&self, chat_id: i64, repo: RepoRef) -> Result<bool> {
        let existing = self.load(chat_id)?;
        let updated = existing.is_some();
        let mut target = existing.unwrap_or_else(|| BuildTarget::new(chat_id));
        target.set_repo(repo);
        self.save(&target)?;
        Ok(updated)
    }

    /// Records the revision of a successful build.
    pub fn set_revision(&self, chat_id: i64, revision: &str) -> Result<()> {
        let mut target = self.load_required(chat_id)?;
        target.set_revision(revision);
        self.save(&target)
    }

    /// Toggles the admin-only flag for a chat.
    pub fn set_admin_only(&self, chat_id: i64, admin_only: bool) -> Result<()> {
        let mut target = self.load_required(chat_id)?;
        target.set_admin_only(admin_only);
        self.save(&target)
    }

    /// Moves a record to a new chat id after a Telegram group migration.
    ///
    /// A missing record is a no-op: the chat had nothing configured.
    pub fn migrate_chat_id(&self, old_chat_id: i64, new_chat_id: i64) -> Result<()> {
        let Some(mut target) = self.load(old_chat_id)? else {
            return Ok(());
        };
        target.chat_id = new_chat_id;
        self.save(&target)?;

        let old_path = self.target_path(old_chat_id);
        if old_path.exists() {
            fs::remove_file(&old_path).map_err(|source| PersistenceError::WriteError {
                path: old_path,
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn repo(s: &str) -> RepoRef {
        s.parse().unwrap()
    }

    #[test]
    fn load_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path());

        assert!(store.load(42).unwrap().is_none());
    }

    #[test]
    fn save_creates_the_targets_dir() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path().join("deep/state"));

        store.save(&BuildTarget::new(42)).unwrap();
        assert!(store.load(42).unwrap().is_some());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path());

        let mut target = BuildTarget::new(-100123);
        target.set_repo(repo("octo/demo"));
        target.set_revision("abc123");
        store.save(&target).unwrap();

        let loaded = store.load(-100123).unwrap().unwrap();
        assert_eq!(loaded.repo, target.repo);
        assert_eq!(loaded.last_built_revision, "abc123");
    }

    #[test]
    fn corrupt_record_is_a_json_error() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path());

        store.set_repo(42, repo("octo/demo")).unwrap();
        fs::write(store.target_path(42), b"not json {").unwrap();

        assert!(matches!(store.load(42), Err(PersistenceError::Json(_))));
    }

    #[test]
    fn set_repo_creates_then_updates() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path());

        let created = store.set_repo(42, repo("octo/demo")).unwrap();
        assert!(!created, "first set should report a new record");

        let updated = store.set_repo(42, repo("octo/other")).unwrap();
        assert!(updated, "second set should report an update");

        let target = store.load(42).unwrap().unwrap();
        assert_eq!(target.repo.unwrap().name(), "other");
    }

    #[test]
    fn set_revision_persists() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path());

        store.set_repo(42, repo("octo/demo")).unwrap();
        store.set_revision(42, "abc123").unwrap();

        let target = store.load(42).unwrap().unwrap();
        assert_eq!(target.last_built_revision, "abc123");
    }

    #[test]
    fn set_revision_on_missing_target_fails() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path());

        let result = store.set_revision(42, "abc123");
        assert!(matches!(result, Err(PersistenceError::NotFound { .. })));
    }

    #[test]
    fn admin_only_roundtrip() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path());

        store.set_repo(42, repo("octo/demo")).unwrap();
        store.set_admin_only(42, true).unwrap();
        assert!(store.load(42).unwrap().unwrap().admin_only);

        store.set_admin_only(42, false).unwrap();
        assert!(!store.load(42).unwrap().unwrap().admin_only);
    }

    #[test]
    fn migrate_moves_record() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path());

        store.set_repo(42, repo("octo/demo")).unwrap();
        store.set_revision(42, "abc123").unwrap();

        store.migrate_chat_id(42, -10042).unwrap();

        assert!(store.load(42).unwrap().is_none());
        let target = store.load(-10042).unwrap().unwrap();
        assert_eq!(target.chat_id, -10042);
        assert_eq!(target.last_built_revision, "abc123");
    }

    #[test]
    fn migrate_missing_record_is_noop() {
        let dir = tempdir().unwrap();
        let store = TargetStore::new(dir.path());

        store.migrate_chat_id(1, 2).unwrap();
        assert!(store.load(2).unwrap().is_none());
    }
}
