//! Gradle release-build invocation.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{BuilderError, Result};
use crate::locator::log_path;

/// Marker Gradle prints on stdout when the assembly succeeded.
const SUCCESS_MARKER: &str = "BUILD SUCCESSFUL";

/// File name of the signed release APK inside the build tree.
const ARTIFACT_NAME: &str = "app-release.apk";

/// Runs `./gradlew assembleRelease` inside a working copy.
///
/// Diagnostic output is redirected to `<workdir>/error.log` so it can be
/// offered to the user after a failure. The subprocess runs to completion;
/// no timeout is enforced at this layer.
#[derive(Debug, Clone, Default)]
pub struct GradleBuilder;

impl GradleBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Builds the release APK and returns the path where Gradle left it.
    ///
    /// Success requires both the `BUILD SUCCESSFUL` marker on stdout and
    /// an `app-release.apk` in the working tree; the marker alone is not
    /// sufficient because APK signing can fail without failing the build.
    pub async fn build(&self, workdir: &Path) -> Result<PathBuf> {
        let gradlew = workdir.join("gradlew");
        make_executable(&gradlew)?;

        let log = log_path(workdir);
        let log_file = File::create(&log)?;

        info!(workdir = %workdir.display(), "Starting gradle release build");
        let output = Command::new(&gradlew)
            .args(["assembleRelease", "--stacktrace"])
            .current_dir(workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::from(log_file))
            .output()
            .await?;

        if !output.status.success() {
            warn!(
                workdir = %workdir.display(),
                code = ?output.status.code(),
                "Gradle exited non-zero"
            );
            return Err(BuilderError::ToolFailed {
                code: output.status.code(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.contains(SUCCESS_MARKER) {
            return Err(BuilderError::MarkerMissing);
        }

        match find_artifact(workdir, ARTIFACT_NAME)? {
            Some(path) => {
                debug!(artifact = %path.display(), "Found built APK");
                Ok(path)
            }
            None => {
                warn!(workdir = %workdir.display(), "APK not available after successful build");
                Err(BuilderError::ArtifactMissing)
            }
        }
    }
}

fn make_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o755);
        std::fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Depth-first search of the working tree for the named artifact.
fn find_artifact(root: &Path, name: &str) -> std::io::Result<Option<PathBuf>> {
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            if let Some(found) = find_artifact(&path, name)? {
                return Ok(Some(found));
            }
        } else if path.file_name().is_some_and(|f| f == name) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    /// Writes a fake gradlew script that runs the given shell body.
    fn write_gradlew(workdir: &Path, body: &str) {
        fs::create_dir_all(workdir).unwrap();
        fs::write(workdir.join("gradlew"), format!("#!/bin/sh\n{}\n", body)).unwrap();
    }

    #[tokio::test]
    async fn successful_build_returns_artifact_path() {
        let dir = tempdir().unwrap();
        let workdir = dir.path().join("demo");
        write_gradlew(
            &workdir,
            "mkdir -p app/build/outputs/apk/release\n\
             : > app/build/outputs/apk/release/app-release.apk\n\
             echo BUILD SUCCESSFUL",
        );

        let builder = GradleBuilder::new();
        let apk = builder.build(&workdir).await.unwrap();
        assert!(apk.ends_with("app-release.apk"));
        assert!(apk.exists());
    }

    #[tokio::test]
    async fn marker_without_artifact_is_a_failure() {
        let dir = tempdir().unwrap();
        let workdir = dir.path().join("demo");
        write_gradlew(&workdir, "echo BUILD SUCCESSFUL");

        let builder = GradleBuilder::new();
        let result = builder.build(&workdir).await;
        assert!(matches!(result, Err(BuilderError::ArtifactMissing)));
    }

    #[tokio::test]
    async fn missing_marker_is_a_failure() {
        let dir = tempdir().unwrap();
        let workdir = dir.path().join("demo");
        write_gradlew(&workdir, "echo compiling...");

        let builder = GradleBuilder::new();
        let result = builder.build(&workdir).await;
        assert!(matches!(result, Err(BuilderError::MarkerMissing)));
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failure_and_captures_stderr() {
        let dir = tempdir().unwrap();
        let workdir = dir.path().join("demo");
        write_gradlew(
            &workdir,
            "echo 'Execution failed for task :app:assembleRelease' >&2\nexit 1",
        );

        let builder = GradleBuilder::new();
        let result = builder.build(&workdir).await;
        assert!(matches!(
            result,
            Err(BuilderError::ToolFailed { code: Some(1) })
        ));

        let log = fs::read_to_string(log_path(&workdir)).unwrap();
        assert!(log.contains("Execution failed"));
    }

    #[test]
    fn find_artifact_walks_nested_dirs() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("app-release.apk"), b"apk").unwrap();

        let found = find_artifact(dir.path(), "app-release.apk").unwrap();
        assert_eq!(found.unwrap(), nested.join("app-release.apk"));
    }

    #[test]
    fn find_artifact_none_when_absent() {
        let dir = tempdir().unwrap();
        assert!(find_artifact(dir.path(), "app-release.apk")
            .unwrap()
            .is_none());
    }
}
