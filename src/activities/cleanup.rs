//! Scratch cleanup.
//!
//! Removes a run's scratch subdirectory at the end of a run. The validation
//! here is deliberately paranoid: the scratch root is shared by every run on
//! the worker, and a bad subdirectory value must never be able to point the
//! recursive delete at the root, the filesystem root, or anywhere up the
//! tree.

use std::path::{Component, Path};

use tokio::fs;
use tracing::info;

use super::Activities;
use crate::error::{Error, Result};

/// Reject any subdirectory value that does not name a strict descendant of
/// the scratch root.
pub fn validate_scratch_subdir(subdir: &str) -> Result<()> {
    if subdir.is_empty() {
        return Err(Error::CleanupSafety("scratch subdir is empty".into()));
    }
    let path = Path::new(subdir);
    let mut normals = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => normals += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::CleanupSafety(format!(
                    "scratch subdir escapes the scratch root: {subdir}"
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::CleanupSafety(format!(
                    "scratch subdir must be relative: {subdir}"
                )));
            }
        }
    }
    if normals == 0 {
        return Err(Error::CleanupSafety(format!(
            "scratch subdir resolves to the scratch root: {subdir}"
        )));
    }
    Ok(())
}

impl Activities {
    /// Remove the run's scratch subdirectory. Idempotent: a missing
    /// directory is success.
    pub async fn cleanup_scratch(&self, subdir: &str) -> Result<()> {
        validate_scratch_subdir(subdir)?;
        let dir = self.scratch_dir(subdir);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(dir = %dir.display(), "Removed scratch directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;

    #[test]
    fn rejects_unsafe_subdirs() {
        for bad in ["", ".", "/", "..", "a/../b", "./..", "/abs/path", "../x"] {
            assert!(
                matches!(validate_scratch_subdir(bad), Err(Error::CleanupSafety(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn accepts_plain_subdirs() {
        for ok in ["run-1", "runs/2024/zone-a", "./run-1"] {
            validate_scratch_subdir(ok).unwrap_or_else(|e| panic!("{ok:?} rejected: {e}"));
        }
    }

    #[tokio::test]
    async fn removes_existing_directory_and_tolerates_missing() {
        let root = tempfile::tempdir().unwrap();
        let acts = Activities::new(WorkerConfig::with_scratch_root(root.path()));

        let dir = root.path().join("run-1");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested/file"), b"x").unwrap();

        acts.cleanup_scratch("run-1").await.unwrap();
        assert!(!dir.exists());
        // Second call is a no-op.
        acts.cleanup_scratch("run-1").await.unwrap();
    }

    #[tokio::test]
    async fn unsafe_subdir_leaves_filesystem_unchanged() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("precious"), b"x").unwrap();
        let acts = Activities::new(WorkerConfig::with_scratch_root(root.path()));

        assert!(acts.cleanup_scratch("..").await.is_err());
        assert!(acts.cleanup_scratch("").await.is_err());
        assert!(root.path().join("precious").exists());
    }
}
