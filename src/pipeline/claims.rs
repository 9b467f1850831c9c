//! Per-path exclusivity for workflows.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Set of paths that currently have an active workflow
#[derive(Clone, Default)]
pub(crate) struct ClaimSet {
    active: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ClaimSet {
    /// Claim `path`, or return None if another workflow holds it
    pub(crate) fn try_claim(&self, path: &Path) -> Option<Claim> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(path.to_path_buf()) {
            return None;
        }
        Some(Claim {
            active: Arc::clone(&self.active),
            path: path.to_path_buf(),
        })
    }

    /// Number of paths currently claimed
    pub(crate) fn len(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive hold on a path; released on drop
pub(crate) struct Claim {
    active: Arc<Mutex<HashSet<PathBuf>>>,
    path: PathBuf,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.path);
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_for_same_path_is_refused() {
        let claims = ClaimSet::default();
        let path = Path::new("/videos/video_0.mp4");

        let first = claims.try_claim(path);
        assert!(first.is_some());
        assert!(claims.try_claim(path).is_none());
        assert_eq!(claims.len(), 1);
    }

    #[test]
    fn dropping_claim_releases_path() {
        let claims = ClaimSet::default();
        let path = Path::new("/videos/video_0.mp4");

        drop(claims.try_claim(path).unwrap());
        assert_eq!(claims.len(), 0);
        assert!(claims.try_claim(path).is_some());
    }

    #[test]
    fn distinct_paths_are_independent() {
        let claims = ClaimSet::default();
        let _a = claims.try_claim(Path::new("/videos/a.mp4")).unwrap();
        let _b = claims.try_claim(Path::new("/videos/b.mp4")).unwrap();
        assert_eq!(claims.len(), 2);
    }
}
