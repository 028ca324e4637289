//! Per-chat build configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repo::RepoRef;

/// One chat's persisted build configuration.
///
/// Created on the first successful `/setrepo`, mutated on every successful
/// build (revision) and every admin-only toggle, and never deleted. When
/// Telegram migrates a group to a new chat id the record is moved in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildTarget {
    /// Telegram chat id this target belongs to.
    pub chat_id: i64,

    /// Configured repository; `None` until `/setrepo` succeeds.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub repo: Option<RepoRef>,

    /// Short hash of the last successfully built revision; empty when the
    /// target has never been built.
    #[serde(default)]
    pub last_built_revision: String,

    /// Whether `/build` is restricted to chat administrators.
    #[serde(default)]
    pub admin_only: bool,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl BuildTarget {
    /// Creates a fresh target for a chat with nothing configured yet.
    pub fn new(chat_id: i64) -> Self {
        let now = Utc::now();
        Self {
            chat_id,
            repo: None,
            last_built_revision: String::new(),
            admin_only: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Points the target at a new repository.
    ///
    /// Resets the last-built revision: a hash recorded for the previous
    /// repository must never suppress the first build of the new one.
    pub fn set_repo(&mut self, repo: RepoRef) {
        if self.repo.as_ref() != Some(&repo) {
            self.last_built_revision.clear();
        }
        self.repo = Some(repo);
        self.touch();
    }

    /// Records a successfully built revision.
    pub fn set_revision(&mut self, revision: impl Into<String>) {
        self.last_built_revision = revision.into();
        self.touch();
    }

    /// Toggles the admin-only flag.
    pub fn set_admin_only(&mut self, admin_only: bool) {
        self.admin_only = admin_only;
        self.touch();
    }

    /// Whether a build has ever completed for this target.
    pub fn has_built(&self) -> bool {
        !self.last_built_revision.is_empty()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_target_is_unconfigured() {
        let target = BuildTarget::new(42);
        assert_eq!(target.chat_id, 42);
        assert!(target.repo.is_none());
        assert!(!target.has_built());
        assert!(!target.admin_only);
    }

    #[test]
    fn changing_repo_resets_revision() {
        let mut target = BuildTarget::new(1);
        target.set_repo("octo/demo".parse().unwrap());
        target.set_revision("abc123");
        assert!(target.has_built());

        target.set_repo("octo/other".parse().unwrap());
        assert!(!target.has_built());
    }

    #[test]
    fn resetting_same_repo_keeps_revision() {
        let mut target = BuildTarget::new(1);
        target.set_repo("octo/demo".parse().unwrap());
        target.set_revision("abc123");

        target.set_repo("octo/demo".parse().unwrap());
        assert_eq!(target.last_built_revision, "abc123");
    }

    #[test]
    fn roundtrips_through_json() {
        let mut target = BuildTarget::new(-100123);
        target.set_repo("octo/demo".parse().unwrap());
        target.set_revision("def456");
        target.set_admin_only(true);

        let json = serde_json::to_string(&target).unwrap();
        let back: BuildTarget = serde_json::from_str(&json).unwrap();
        assert_eq!(back.chat_id, -100123);
        assert_eq!(back.repo, target.repo);
        assert_eq!(back.last_built_revision, "def456");
        assert!(back.admin_only);
    }
}
