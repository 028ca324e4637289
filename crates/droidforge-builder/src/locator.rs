//! Deterministic artifact placement.
//!
//! Every built APK is moved to `<workdir>/output/<name>-<revision>.apk`.
//! The destination is a pure function of (workdir, revision), so the same
//! path can be computed without building to answer "was this revision
//! already built?".

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Destination path for the APK built from `revision`.
pub fn artifact_destination(workdir: &Path, revision: &str) -> PathBuf {
    let name = workdir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("app");
    workdir
        .join("output")
        .join(format!("{}-{}.apk", name, revision))
}

/// Path of the captured build log for a working copy.
pub fn log_path(workdir: &Path) -> PathBuf {
    workdir.join("error.log")
}

/// Moves a freshly built APK to its revision-tagged destination.
///
/// Falls back to copy-and-remove when a plain rename crosses filesystems.
pub fn place_artifact(workdir: &Path, found: &Path, revision: &str) -> Result<PathBuf> {
    let dest = artifact_destination(workdir, revision);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if std::fs::rename(found, &dest).is_err() {
        std::fs::copy(found, &dest)?;
        std::fs::remove_file(found)?;
    }
    Ok(dest)
}
