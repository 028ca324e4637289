//! Clone-or-pull sync against a remote repository.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{GitError, Result};

/// Syncs working copies by driving the `git` CLI.
#[derive(Debug, Clone, Default)]
pub struct GitSync;

impl GitSync {
    pub fn new() -> Self {
        Self
    }

    /// Ensures an up-to-date working copy at `workdir` and returns the
    /// short revision of its HEAD.
    ///
    /// Clones from `clone_url` when no working copy exists, pulls the
    /// default remote/branch otherwise. Either failure fails the sync.
    pub async fn sync(&self, clone_url: &str, workdir: &Path) -> Result<String> {
        if workdir.is_dir() {
            debug!(workdir = %workdir.display(), "Pulling existing working copy");
            self.pull(workdir).await?;
        } else {
            debug!(workdir = %workdir.display(), "Cloning fresh working copy");
            self.clone(clone_url, workdir).await?;
        }

        let head = self.head_revision(workdir).await;
        if head.is_empty() {
            return Err(GitError::Command(
                "could not read HEAD after sync".to_string(),
            ));
        }
        Ok(head)
    }

    /// Short revision of the local HEAD, or the empty string on any
    /// failure. An empty revision means "unknown" and is always treated
    /// as stale by the orchestrator.
    pub async fn head_revision(&self, workdir: &Path) -> String {
        let output = Command::new("git")
            .args(["-C"])
            .arg(workdir)
            .args(["rev-parse", "--short", "HEAD"])
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                String::from_utf8_lossy(&out.stdout).trim().to_string()
            }
            Ok(out) => {
                debug!(
                    workdir = %workdir.display(),
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "rev-parse failed"
                );
                String::new()
            }
            Err(e) => {
                warn!(error = %e, "Failed to run git rev-parse");
                String::new()
            }
        }
    }

    async fn clone(&self, clone_url: &str, workdir: &Path) -> Result<()> {
        let output = Command::new("git")
            .arg("clone")
            .arg(clone_url)
            .arg(workdir)
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(stderr = %stderr.trim(), "git clone failed");
        Err(classify_clone_failure(&stderr))
    }

    async fn pull(&self, workdir: &Path) -> Result<()> {
        let output = Command::new("git")
            .args(["-C"])
            .arg(workdir)
            .arg("pull")
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(workdir = %workdir.display(), stderr = %stderr.trim(), "git pull failed");
        Err(GitError::Command(format!(
            "pull failed: {}",
            first_line(&stderr)
        )))
    }
}

/// Maps clone stderr to the sync error taxonomy.
fn classify_clone_failure(stderr: &str) -> GitError {
    if stderr.contains("Authentication failed") || stderr.contains("could not read Username") {
        GitError::AuthFailed
    } else if stderr.contains("Repository not found") || stderr.contains("not found") {
        GitError::NotFound
    } else {
        GitError::Command(format!("clone failed: {}", first_line(stderr)))
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("").trim()
}
