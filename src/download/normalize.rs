//! Output name normalization.
//!
//! Downloaders that merge separate audio and video streams may append the container extension
//! to the requested name, producing `video_0.mp4.mp4` or `video_0.mp4.mkv`. The pipeline
//! processes whatever path appears, so the result is renamed back to the requested name.

use crate::error::{DownloadError, Result};
use std::path::{Path, PathBuf};

/// Ensure the fetched file lives at `watch_dir/target_name`, returning that path
///
/// Merge-suffixed candidates (`target_name.<ext>` for each of `merge_extensions`) take
/// precedence over a file already at the target. A stale fragment under the plain name is
/// deleted before the merged file is renamed into place, so the watcher sees the merged file
/// arrive as a new file rather than as a silent content swap.
pub async fn normalize_output(
    watch_dir: &Path,
    target_name: &str,
    merge_extensions: &[String],
) -> Result<PathBuf> {
    let target = watch_dir.join(target_name);

    for ext in merge_extensions {
        let candidate = watch_dir.join(format!("{}.{}", target_name, ext.trim_start_matches('.')));
        if !is_file(&candidate).await {
            continue;
        }

        if is_file(&target).await {
            tracing::warn!(path = %target.display(), "removing fragment superseded by merged output");
            if let Err(e) = tokio::fs::remove_file(&target).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                return Err(DownloadError::NormalizeFailed {
                    from: candidate.clone(),
                    to: target.clone(),
                    reason: format!("could not remove stale fragment: {}", e),
                }
                .into());
            }
        }

        tracing::debug!(
            from = %candidate.display(),
            to = %target.display(),
            "normalizing merged output name"
        );
        tokio::fs::rename(&candidate, &target)
            .await
            .map_err(|e| DownloadError::NormalizeFailed {
                from: candidate.clone(),
                to: target.clone(),
                reason: e.to_string(),
            })?;
        return Ok(target);
    }

    if is_file(&target).await {
        return Ok(target);
    }

    Err(DownloadError::OutputMissing { expected: target }.into())
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
