//! Readiness detection for freshly created files.
//!
//! Creation events can fire before a writer has finished (a downloader merging separate
//! audio and video streams, for instance). A file is considered ready once it exists and two
//! size samples taken `poll_interval` apart agree.

use crate::config::StabilityConfig;
use crate::error::StabilityError;
use crate::utils::file_size;
use std::path::Path;
use tokio::time::{Instant, sleep};

/// Wait until `path` exists and its size stops changing, returning the settled size
///
/// Sleeps `grace_period` first, then samples the size every `poll_interval`. Growth restarts
/// the comparison. Fails as soon as the file is absent, or once `max_wait` has elapsed
/// without two matching samples.
pub async fn wait_for_stability(
    path: &Path,
    config: &StabilityConfig,
) -> Result<u64, StabilityError> {
    let started = Instant::now();
    sleep(config.grace_period).await;

    let mut last = sample(path).await?;
    loop {
        sleep(config.poll_interval).await;
        let current = sample(path).await?;
        if current == last {
            tracing::debug!(path = %path.display(), bytes = current, "file size settled");
            return Ok(current);
        }

        tracing::debug!(
            path = %path.display(),
            previous = last,
            current,
            "file still changing"
        );
        last = current;

        let waited = started.elapsed();
        if waited >= config.max_wait {
            return Err(StabilityError::NeverStable {
                path: path.to_path_buf(),
                waited,
            });
        }
    }
}

async fn sample(path: &Path) -> Result<u64, StabilityError> {
    match file_size(path).await {
        Ok(Some(size)) => Ok(size),
        Ok(None) => Err(StabilityError::Missing {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(StabilityError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn quick() -> StabilityConfig {
        StabilityConfig {
            grace_period: Duration::from_millis(20),
            poll_interval: Duration::from_millis(20),
            max_wait: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn settled_file_is_ready() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("video_0.mp4");
        std::fs::write(&path, b"0123456789").unwrap();

        let size = wait_for_stability(&path, &quick()).await.unwrap();
        assert_eq!(size, 10);
    }

    #[tokio::test]
    async fn absent_file_is_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never.mp4");

        let err = wait_for_stability(&path, &quick()).await.unwrap_err();
        assert!(matches!(err, StabilityError::Missing { .. }));
    }

    #[tokio::test]
    async fn file_removed_during_wait_is_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("video_0.mp4.mp4");
        std::fs::write(&path, b"data").unwrap();

        let config = StabilityConfig {
            grace_period: Duration::from_millis(200),
            ..quick()
        };
        let remover = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                std::fs::remove_file(&path).unwrap();
            })
        };

        let err = wait_for_stability(&path, &config).await.unwrap_err();
        remover.await.unwrap();
        assert!(matches!(err, StabilityError::Missing { .. }));
    }

    #[tokio::test]
    async fn growing_file_waits_until_writes_stop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("video_0.mp4");
        std::fs::write(&path, b"").unwrap();

        let writer = {
            let path = path.clone();
            tokio::spawn(async move {
                for _ in 0..5 {
                    let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
                    f.write_all(&[0u8; 100]).unwrap();
                    drop(f);
                    tokio::time::sleep(Duration::from_millis(15)).await;
                }
            })
        };

        let config = StabilityConfig {
            grace_period: Duration::from_millis(5),
            poll_interval: Duration::from_millis(60),
            max_wait: Duration::from_secs(5),
        };
        let size = wait_for_stability(&path, &config).await.unwrap();
        writer.await.unwrap();
        assert_eq!(size, 500);
    }

    #[tokio::test]
    async fn endlessly_growing_file_never_stabilizes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("video_0.mp4");
        std::fs::write(&path, b"").unwrap();

        let stop = tokio_util::sync::CancellationToken::new();
        let writer = {
            let path = path.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                while !stop.is_cancelled() {
                    let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
                    f.write_all(&[1u8; 10]).unwrap();
                    drop(f);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
        };

        let config = StabilityConfig {
            grace_period: Duration::from_millis(5),
            poll_interval: Duration::from_millis(40),
            max_wait: Duration::from_millis(200),
        };
        let err = wait_for_stability(&path, &config).await.unwrap_err();
        stop.cancel();
        writer.await.unwrap();
        assert!(matches!(err, StabilityError::NeverStable { .. }));
    }
}
