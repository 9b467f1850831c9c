//! Utility functions for file operations and path manipulation

use crate::error::{QuarantineError, Result};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Get a free path for a file, adding ` (N)` before the extension on collision
///
/// # Examples
///
/// ```
/// use flic_ingest::utils::unique_path;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/does-not-exist/video_0.mp4");
/// assert_eq!(unique_path(path).unwrap(), path);
/// // If video_0.mp4 exists, returns video_0 (1).mp4
/// // If that exists too, returns video_0 (2).mp4, etc.
/// ```
pub fn unique_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
        QuarantineError::InvalidPath {
            path: path.to_path_buf(),
            reason: "Cannot extract file stem".to_string(),
        }
    })?;

    let extension = path.extension().and_then(|e| e.to_str());

    let parent = path.parent().ok_or_else(|| QuarantineError::InvalidPath {
        path: path.to_path_buf(),
        reason: "Cannot extract parent directory".to_string(),
    })?;

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let new_name = match extension {
            Some(ext) => format!("{} ({}).{}", stem, i, ext),
            None => format!("{} ({})", stem, i),
        };
        let new_path = parent.join(new_name);
        if !new_path.exists() {
            return Ok(new_path);
        }
    }

    Err(QuarantineError::FileCollision {
        path: path.to_path_buf(),
        reason: format!(
            "Could not find unique filename after {} attempts",
            MAX_RENAME_ATTEMPTS
        ),
    }
    .into())
}

/// Move a file, falling back to copy + remove when `rename` cannot cross filesystems
pub async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            tracing::debug!(
                from = %from.display(),
                to = %to.display(),
                "rename crosses filesystems, copying instead"
            );
            tokio::fs::copy(from, to).await?;
            if let Err(e) = tokio::fs::remove_file(from).await {
                // Leave exactly one copy behind
                let _ = tokio::fs::remove_file(to).await;
                return Err(e);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Current size of a file, or None if it does not exist
pub async fn file_size(path: &Path) -> std::io::Result<Option<u64>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
