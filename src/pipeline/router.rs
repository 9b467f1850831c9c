//! Failure routing: moving files that failed processing into quarantine.

use crate::error::{QuarantineError, Result};
use crate::utils::{move_file, unique_path};
use std::path::{Path, PathBuf};

/// What happened to a file handed to [`FailureRouter::quarantine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarantineOutcome {
    /// File now lives at this path inside the quarantine directory
    Moved(PathBuf),
    /// Nothing to move: the file was not at its expected location
    AlreadyAbsent,
}

/// Relocates failed files into the quarantine directory
///
/// The base filename is preserved. When a file of the same name is already quarantined the
/// newcomer becomes `name (1).ext`, `name (2).ext`, ... so nothing is overwritten.
#[derive(Clone, Debug)]
pub struct FailureRouter {
    quarantine_dir: PathBuf,
}

impl FailureRouter {
    /// Create a router targeting `quarantine_dir` (created lazily on first use)
    pub fn new(quarantine_dir: impl Into<PathBuf>) -> Self {
        Self {
            quarantine_dir: quarantine_dir.into(),
        }
    }

    /// The quarantine directory
    pub fn quarantine_dir(&self) -> &Path {
        &self.quarantine_dir
    }

    /// Move `path` into quarantine
    ///
    /// Calling this for a file that is already gone (for example, a second failure path for
    /// the same file) reports [`QuarantineOutcome::AlreadyAbsent`] instead of failing.
    ///
    /// # Errors
    /// Returns [`QuarantineError`] if the directory cannot be created or the move fails. The
    /// file is left where it was.
    pub async fn quarantine(&self, path: &Path) -> Result<QuarantineOutcome> {
        let file_name = path.file_name().ok_or_else(|| QuarantineError::InvalidPath {
            path: path.to_path_buf(),
            reason: "File has no filename".to_string(),
        })?;

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::warn!(path = %path.display(), "file already absent, nothing to quarantine");
            return Ok(QuarantineOutcome::AlreadyAbsent);
        }

        tokio::fs::create_dir_all(&self.quarantine_dir)
            .await
            .map_err(|e| QuarantineError::CreateDirFailed {
                path: self.quarantine_dir.clone(),
                reason: e.to_string(),
            })?;

        let dest = unique_path(&self.quarantine_dir.join(file_name))?;

        tracing::debug!(from = %path.display(), to = %dest.display(), "moving file to quarantine");
        match move_file(path, &dest).await {
            Ok(()) => {
                tracing::warn!(path = %dest.display(), "Moved file to failed directory");
                Ok(QuarantineOutcome::Moved(dest))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "file vanished before quarantine move");
                Ok(QuarantineOutcome::AlreadyAbsent)
            }
            Err(e) => Err(QuarantineError::MoveFailed {
                source_path: path.to_path_buf(),
                dest_path: dest,
                reason: e.to_string(),
            }
            .into()),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn moves_file_and_creates_directory() {
        let temp = TempDir::new().unwrap();
        let watch = temp.path().join("videos");
        fs::create_dir_all(&watch).unwrap();
        let file = watch.join("video_0.mp4");
        fs::write(&file, b"x").unwrap();

        let router = FailureRouter::new(temp.path().join("failed_videos"));
        let outcome = router.quarantine(&file).await.unwrap();

        let expected = temp.path().join("failed_videos").join("video_0.mp4");
        assert_eq!(outcome, QuarantineOutcome::Moved(expected.clone()));
        assert!(!file.exists());
        assert_eq!(fs::read(expected).unwrap(), b"x");
    }

    #[tokio::test]
    async fn second_call_reports_already_absent() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("video_0.mp4");
        fs::write(&file, b"x").unwrap();
        let router = FailureRouter::new(temp.path().join("q"));

        assert!(matches!(
            router.quarantine(&file).await.unwrap(),
            QuarantineOutcome::Moved(_)
        ));
        assert_eq!(
            router.quarantine(&file).await.unwrap(),
            QuarantineOutcome::AlreadyAbsent
        );
    }

    #[tokio::test]
    async fn collisions_get_numbered_suffix() {
        let temp = TempDir::new().unwrap();
        let quarantine = temp.path().join("q");
        fs::create_dir_all(&quarantine).unwrap();
        fs::write(quarantine.join("video_0.mp4"), b"old").unwrap();

        let file = temp.path().join("video_0.mp4");
        fs::write(&file, b"new").unwrap();

        let router = FailureRouter::new(&quarantine);
        let outcome = router.quarantine(&file).await.unwrap();

        assert_eq!(
            outcome,
            QuarantineOutcome::Moved(quarantine.join("video_0 (1).mp4"))
        );
        assert_eq!(fs::read(quarantine.join("video_0.mp4")).unwrap(), b"old");
        assert_eq!(fs::read(quarantine.join("video_0 (1).mp4")).unwrap(), b"new");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unwritable_quarantine_leaves_file_in_place() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("video_0.mp4");
        fs::write(&file, b"x").unwrap();

        // A regular file where the quarantine directory should be
        let blocker = temp.path().join("q");
        fs::write(&blocker, b"not a dir").unwrap();

        let router = FailureRouter::new(&blocker);
        let err = router.quarantine(&file).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Quarantine(QuarantineError::CreateDirFailed { .. })
        ));
        assert!(file.exists());
    }

    #[tokio::test]
    async fn path_without_file_name_is_invalid() {
        let router = FailureRouter::new("/tmp/q");
        let err = router.quarantine(Path::new("/")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Quarantine(QuarantineError::InvalidPath { .. })
        ));
    }
}
