//! The build orchestration workflow.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use droidforge_builder::{artifact_destination, log_path, place_artifact, GradleBuilder};
use droidforge_git::{GitError, GitSync};
use droidforge_models::{
    BuildAttempt, BuildFailure, BuildOutcome, BuildPhase, GitCredentials, RepoRef,
};
use droidforge_persistence::TargetStore;

use crate::error::Result;

/// Syncs a working copy and reads its revision.
#[async_trait]
pub trait RepoSyncer: Send + Sync {
    /// Clone-or-pull; returns the short HEAD revision after sync.
    async fn sync(&self, clone_url: &str, workdir: &Path) -> std::result::Result<String, GitError>;

    /// Short local HEAD revision, empty string when unknown.
    async fn head_revision(&self, workdir: &Path) -> String;
}

#[async_trait]
impl RepoSyncer for GitSync {
    async fn sync(&self, clone_url: &str, workdir: &Path) -> std::result::Result<String, GitError> {
        GitSync::sync(self, clone_url, workdir).await
    }

    async fn head_revision(&self, workdir: &Path) -> String {
        GitSync::head_revision(self, workdir).await
    }
}

/// Builds an APK inside a working copy, returning where the tool left it.
#[async_trait]
pub trait ApkBuilder: Send + Sync {
    async fn build(
        &self,
        workdir: &Path,
    ) -> std::result::Result<PathBuf, droidforge_builder::BuilderError>;
}

#[async_trait]
impl ApkBuilder for GradleBuilder {
    async fn build(
        &self,
        workdir: &Path,
    ) -> std::result::Result<PathBuf, droidforge_builder::BuilderError> {
        GradleBuilder::build(self, workdir).await
    }
}

/// Receives phase notifications during a build attempt.
///
/// Events arrive strictly in phase order, at most once per phase, just
/// before the phase starts.
#[async_trait]
pub trait BuildProgress: Send + Sync {
    async fn update(&self, phase: BuildPhase);
}

/// Progress sink that discards all events.
pub struct NullProgress;

#[async_trait]
impl BuildProgress for NullProgress {
    async fn update(&self, _phase: BuildPhase) {}
}

/// Sequences the build workflow for all chats.
///
/// Holds the in-flight registry that serializes attempts per target: the
/// working copy, its `output/` directory and `error.log` are not safe for
/// concurrent mutation, so a second attempt for a chat whose build is
/// still running is rejected with [`BuildFailure::InProgress`].
pub struct BuildOrchestrator {
    store: Arc<TargetStore>,
    syncer: Arc<dyn RepoSyncer>,
    builder: Arc<dyn ApkBuilder>,
    repos_root: PathBuf,
    credentials: Option<GitCredentials>,
    in_flight: Mutex<HashSet<i64>>,
}

impl BuildOrchestrator {
    /// Creates an orchestrator over the real git and gradle collaborators.
    pub fn new(
        store: Arc<TargetStore>,
        repos_root: impl Into<PathBuf>,
        credentials: Option<GitCredentials>,
    ) -> Self {
        Self::with_collaborators(
            store,
            Arc::new(GitSync::new()),
            Arc::new(GradleBuilder::new()),
            repos_root,
            credentials,
        )
    }

    /// Creates an orchestrator with explicit collaborators (used by tests).
    pub fn with_collaborators(
        store: Arc<TargetStore>,
        syncer: Arc<dyn RepoSyncer>,
        builder: Arc<dyn ApkBuilder>,
        repos_root: impl Into<PathBuf>,
        credentials: Option<GitCredentials>,
    ) -> Self {
        Self {
            store,
            syncer,
            builder,
            repos_root: repos_root.into(),
            credentials,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Working copy directory for a repository.
    pub fn workdir(&self, repo: &RepoRef) -> PathBuf {
        self.repos_root.join(repo.name())
    }

    /// Path of the captured build log for a repository.
    pub fn build_log(&self, repo: &RepoRef) -> PathBuf {
        log_path(&self.workdir(repo))
    }

    /// Deterministic path of the artifact built from `revision`.
    pub fn built_artifact(&self, repo: &RepoRef, revision: &str) -> PathBuf {
        artifact_destination(&self.workdir(repo), revision)
    }

    /// Runs one build attempt for a chat.
    ///
    /// Every collaborator failure is converted into a typed
    /// [`BuildFailure`] outcome; only configuration-store failures
    /// propagate as errors.
    pub async fn run_build(
        &self,
        chat_id: i64,
        force: bool,
        progress: &dyn BuildProgress,
    ) -> Result<BuildAttempt> {
        let attempt = |outcome| BuildAttempt {
            chat_id,
            forced: force,
            outcome,
        };

        let Some(target) = self.store.load(chat_id)? else {
            return Ok(attempt(BuildOutcome::Failed(BuildFailure::NoRepoConfigured)));
        };
        let Some(repo) = target.repo.clone() else {
            return Ok(attempt(BuildOutcome::Failed(BuildFailure::NoRepoConfigured)));
        };

        // Single-flight per target: reject, don't queue.
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(chat_id) {
                debug!(chat_id, "Rejecting concurrent build attempt");
                return Ok(attempt(BuildOutcome::Failed(BuildFailure::InProgress)));
            }
        }

        let result = self
            .run_phases(chat_id, &repo, &target.last_built_revision, force, progress)
            .await;

        self.in_flight.lock().await.remove(&chat_id);

        Ok(attempt(result?))
    }

    async fn run_phases(
        &self,
        chat_id: i64,
        repo: &RepoRef,
        last_built_revision: &str,
        force: bool,
        progress: &dyn BuildProgress,
    ) -> Result<BuildOutcome> {
        let workdir = self.workdir(repo);

        // Staleness check against the local HEAD only; an empty revision
        // means "unknown" and always builds.
        if !force {
            let head = self.syncer.head_revision(&workdir).await;
            if !head.is_empty() && head == last_built_revision {
                info!(chat_id, revision = %head, "Latest revision already built, skipping");
                return Ok(BuildOutcome::Skipped {
                    artifact: artifact_destination(&workdir, &head),
                    revision: head,
                });
            }
        }

        progress.update(BuildPhase::Syncing).await;
        let clone_url = repo.clone_url(self.credentials.as_ref());
        let revision = match self.syncer.sync(&clone_url, &workdir).await {
            Ok(revision) => revision,
            Err(e) => {
                warn!(chat_id, repo = %repo, error = %e, "Sync failed");
                return Ok(BuildOutcome::Failed(match e {
                    GitError::AuthFailed => BuildFailure::SyncAuth,
                    GitError::NotFound => BuildFailure::SyncNotFound,
                    other => BuildFailure::SyncOther(other.to_string()),
                }));
            }
        };

        progress.update(BuildPhase::Building).await;
        let found = match self.builder.build(&workdir).await {
            Ok(found) => found,
            Err(e) => {
                warn!(chat_id, repo = %repo, error = %e, "Build failed");
                return Ok(BuildOutcome::Failed(BuildFailure::Build {
                    log: log_path(&workdir),
                }));
            }
        };

        progress.update(BuildPhase::Sending).await;
        let artifact = match place_artifact(&workdir, &found, &revision) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(chat_id, repo = %repo, error = %e, "Placing artifact failed");
                return Ok(BuildOutcome::Failed(BuildFailure::Build {
                    log: log_path(&workdir),
                }));
            }
        };

        self.store.set_revision(chat_id, &revision)?;
        info!(chat_id, repo = %repo, revision = %revision, artifact = %artifact.display(), "Build succeeded");

        Ok(BuildOutcome::Success { revision, artifact })
    }
}
