//! End-to-end workflow tests with scripted collaborators.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Mutex;

use droidforge_builder::BuilderError;
use droidforge_git::GitError;
use droidforge_models::{BuildFailure, BuildOutcome, BuildPhase};
use droidforge_orchestrator::{ApkBuilder, BuildOrchestrator, BuildProgress, RepoSyncer};
use droidforge_persistence::TargetStore;

const CHAT: i64 = -100123;

/// What the scripted syncer should do when asked to sync.
#[derive(Clone)]
enum SyncScript {
    /// Create the workdir and report this revision.
    Ok(String),
    AuthFailed,
    NotFound,
    PullFailed,
}

struct MockSyncer {
    local_head: String,
    script: SyncScript,
    sync_calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockSyncer {
    fn new(local_head: &str, script: SyncScript) -> Self {
        Self {
            local_head: local_head.to_string(),
            script,
            sync_calls: AtomicUsize::new(0),
            delay: None,
        }
    }
}

#[async_trait]
impl RepoSyncer for MockSyncer {
    async fn sync(&self, _clone_url: &str, workdir: &Path) -> Result<String, GitError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            SyncScript::Ok(revision) => {
                std::fs::create_dir_all(workdir).unwrap();
                Ok(revision.clone())
            }
            SyncScript::AuthFailed => Err(GitError::AuthFailed),
            SyncScript::NotFound => Err(GitError::NotFound),
            SyncScript::PullFailed => Err(GitError::Command("pull failed: stale remote".into())),
        }
    }

    async fn head_revision(&self, _workdir: &Path) -> String {
        self.local_head.clone()
    }
}

/// Builder that drops an `app-release.apk` into the workdir, or fails.
struct MockBuilder {
    succeed: bool,
    build_calls: AtomicUsize,
}

impl MockBuilder {
    fn new(succeed: bool) -> Self {
        Self {
            succeed,
            build_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ApkBuilder for MockBuilder {
    async fn build(&self, workdir: &Path) -> Result<PathBuf, BuilderError> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        if !self.succeed {
            return Err(BuilderError::ToolFailed { code: Some(1) });
        }
        let apk = workdir.join("app-release.apk");
        std::fs::write(&apk, b"apk").unwrap();
        Ok(apk)
    }
}

#[derive(Default)]
struct RecordingProgress {
    phases: Mutex<Vec<BuildPhase>>,
}

#[async_trait]
impl BuildProgress for RecordingProgress {
    async fn update(&self, phase: BuildPhase) {
        self.phases.lock().await.push(phase);
    }
}

struct Fixture {
    _dir: TempDir,
    store: Arc<TargetStore>,
    repos_root: PathBuf,
}

fn fixture(last_built: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(TargetStore::new(dir.path()));
    store.set_repo(CHAT, "octo/demo".parse().unwrap()).unwrap();
    if !last_built.is_empty() {
        store.set_revision(CHAT, last_built).unwrap();
    }
    let repos_root = dir.path().join("repos");
    Fixture {
        _dir: dir,
        store,
        repos_root,
    }
}

fn orchestrator(
    fx: &Fixture,
    syncer: Arc<MockSyncer>,
    builder: Arc<MockBuilder>,
) -> BuildOrchestrator {
    BuildOrchestrator::with_collaborators(
        Arc::clone(&fx.store),
        syncer,
        builder,
        fx.repos_root.clone(),
        None,
    )
}

#[tokio::test]
async fn unchanged_revision_skips_without_any_work() {
    let fx = fixture("abc123");
    let syncer = Arc::new(MockSyncer::new("abc123", SyncScript::Ok("abc123".into())));
    let builder = Arc::new(MockBuilder::new(true));
    let orch = orchestrator(&fx, Arc::clone(&syncer), Arc::clone(&builder));

    let progress = RecordingProgress::default();
    let attempt = orch.run_build(CHAT, false, &progress).await.unwrap();

    match attempt.outcome {
        BuildOutcome::Skipped { revision, artifact } => {
            assert_eq!(revision, "abc123");
            assert!(artifact.ends_with("demo/output/demo-abc123.apk"));
        }
        other => panic!("expected skip, got {:?}", other),
    }
    assert_eq!(syncer.sync_calls.load(Ordering::SeqCst), 0);
    assert_eq!(builder.build_calls.load(Ordering::SeqCst), 0);
    assert!(progress.phases.lock().await.is_empty());
}

#[tokio::test]
async fn force_build_runs_full_sequence_despite_equal_revision() {
    let fx = fixture("abc123");
    let syncer = Arc::new(MockSyncer::new("abc123", SyncScript::Ok("abc123".into())));
    let builder = Arc::new(MockBuilder::new(true));
    let orch = orchestrator(&fx, Arc::clone(&syncer), Arc::clone(&builder));

    let attempt = orch
        .run_build(CHAT, true, &RecordingProgress::default())
        .await
        .unwrap();

    assert!(attempt.outcome.is_success());
    assert!(attempt.forced);
    assert_eq!(syncer.sync_calls.load(Ordering::SeqCst), 1);
    assert_eq!(builder.build_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn new_revision_builds_and_persists() {
    let fx = fixture("abc123");
    let syncer = Arc::new(MockSyncer::new("abc123", SyncScript::Ok("def456".into())));
    let builder = Arc::new(MockBuilder::new(true));
    let orch = orchestrator(&fx, Arc::clone(&syncer), builder);

    // Local head differs from last built once the remote moved on; the
    // mock reports the new revision after sync.
    let progress = RecordingProgress::default();
    let attempt = orch.run_build(CHAT, true, &progress).await.unwrap();

    match attempt.outcome {
        BuildOutcome::Success { revision, artifact } => {
            assert_eq!(revision, "def456");
            assert!(artifact.ends_with("demo/output/demo-def456.apk"));
            assert!(artifact.exists());
        }
        other => panic!("expected success, got {:?}", other),
    }

    let target = fx.store.load(CHAT).unwrap().unwrap();
    assert_eq!(target.last_built_revision, "def456");

    let phases = progress.phases.lock().await;
    assert_eq!(
        *phases,
        vec![BuildPhase::Syncing, BuildPhase::Building, BuildPhase::Sending]
    );
}

#[tokio::test]
async fn stale_head_triggers_build_without_force() {
    let fx = fixture("abc123");
    // Local head already moved past the last built revision.
    let syncer = Arc::new(MockSyncer::new("def456", SyncScript::Ok("def456".into())));
    let builder = Arc::new(MockBuilder::new(true));
    let orch = orchestrator(&fx, Arc::clone(&syncer), Arc::clone(&builder));

    let attempt = orch
        .run_build(CHAT, false, &RecordingProgress::default())
        .await
        .unwrap();

    assert!(attempt.outcome.is_success());
    assert_eq!(syncer.sync_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_head_is_always_stale() {
    let fx = fixture("");
    // Never built, nothing cloned: both sides empty must NOT skip.
    let syncer = Arc::new(MockSyncer::new("", SyncScript::Ok("abc123".into())));
    let builder = Arc::new(MockBuilder::new(true));
    let orch = orchestrator(&fx, Arc::clone(&syncer), builder);

    let attempt = orch
        .run_build(CHAT, false, &RecordingProgress::default())
        .await
        .unwrap();

    assert!(attempt.outcome.is_success());
    assert_eq!(syncer.sync_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sync_auth_failure_leaves_revision_and_skips_builder() {
    let fx = fixture("abc123");
    let syncer = Arc::new(MockSyncer::new("old000", SyncScript::AuthFailed));
    let builder = Arc::new(MockBuilder::new(true));
    let orch = orchestrator(&fx, syncer, Arc::clone(&builder));

    let attempt = orch
        .run_build(CHAT, false, &RecordingProgress::default())
        .await
        .unwrap();

    assert_eq!(
        attempt.outcome,
        BuildOutcome::Failed(BuildFailure::SyncAuth)
    );
    assert_eq!(builder.build_calls.load(Ordering::SeqCst), 0);
    let target = fx.store.load(CHAT).unwrap().unwrap();
    assert_eq!(target.last_built_revision, "abc123");
}

#[tokio::test]
async fn missing_remote_maps_to_not_found() {
    let fx = fixture("");
    let syncer = Arc::new(MockSyncer::new("", SyncScript::NotFound));
    let builder = Arc::new(MockBuilder::new(true));
    let orch = orchestrator(&fx, syncer, builder);

    let attempt = orch
        .run_build(CHAT, false, &RecordingProgress::default())
        .await
        .unwrap();

    assert_eq!(
        attempt.outcome,
        BuildOutcome::Failed(BuildFailure::SyncNotFound)
    );
}

#[tokio::test]
async fn pull_failure_fails_the_attempt() {
    let fx = fixture("abc123");
    let syncer = Arc::new(MockSyncer::new("old000", SyncScript::PullFailed));
    let builder = Arc::new(MockBuilder::new(true));
    let orch = orchestrator(&fx, syncer, Arc::clone(&builder));

    let attempt = orch
        .run_build(CHAT, false, &RecordingProgress::default())
        .await
        .unwrap();

    assert!(matches!(
        attempt.outcome,
        BuildOutcome::Failed(BuildFailure::SyncOther(_))
    ));
    assert_eq!(builder.build_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn build_failure_attaches_the_log_path() {
    let fx = fixture("");
    let syncer = Arc::new(MockSyncer::new("", SyncScript::Ok("def456".into())));
    let builder = Arc::new(MockBuilder::new(false));
    let orch = orchestrator(&fx, syncer, builder);

    let attempt = orch
        .run_build(CHAT, false, &RecordingProgress::default())
        .await
        .unwrap();

    match attempt.outcome {
        BuildOutcome::Failed(BuildFailure::Build { log }) => {
            assert!(log.ends_with("demo/error.log"));
        }
        other => panic!("expected build failure, got {:?}", other),
    }
    let target = fx.store.load(CHAT).unwrap().unwrap();
    assert_eq!(target.last_built_revision, "", "failed build must not persist");
}

#[tokio::test]
async fn unconfigured_chat_fails_before_any_work() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(TargetStore::new(dir.path()));
    let syncer = Arc::new(MockSyncer::new("", SyncScript::Ok("abc123".into())));
    let builder = Arc::new(MockBuilder::new(true));
    let orch = BuildOrchestrator::with_collaborators(
        store,
        Arc::clone(&syncer) as Arc<dyn RepoSyncer>,
        builder,
        dir.path().join("repos"),
        None,
    );

    let attempt = orch
        .run_build(999, false, &RecordingProgress::default())
        .await
        .unwrap();

    assert_eq!(
        attempt.outcome,
        BuildOutcome::Failed(BuildFailure::NoRepoConfigured)
    );
    assert_eq!(syncer.sync_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_attempt_for_same_chat_is_rejected() {
    let fx = fixture("");
    let mut slow_syncer = MockSyncer::new("", SyncScript::Ok("def456".into()));
    slow_syncer.delay = Some(Duration::from_millis(200));
    let syncer = Arc::new(slow_syncer);
    let builder = Arc::new(MockBuilder::new(true));
    let orch = Arc::new(orchestrator(&fx, syncer, builder));

    let first = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.run_build(CHAT, true, &NullSink).await })
    };

    // Let the first attempt take the in-flight slot.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = orch.run_build(CHAT, true, &NullSink).await.unwrap();
    assert_eq!(
        second.outcome,
        BuildOutcome::Failed(BuildFailure::InProgress)
    );

    let first = first.await.unwrap().unwrap();
    assert!(first.outcome.is_success());

    // The slot is released: a later attempt proceeds again.
    let third = orch.run_build(CHAT, true, &NullSink).await.unwrap();
    assert!(third.outcome.is_success());
}

struct NullSink;

#[async_trait]
impl BuildProgress for NullSink {
    async fn update(&self, _phase: BuildPhase) {}
}
