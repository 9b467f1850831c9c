//! Fetcher trait and the yt-dlp implementation

use crate::error::{DownloadError, Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Fetches one remote video to a local path
///
/// Implementations may leave the result under a merge-suffixed name (`video_0.mp4.mkv`);
/// the download manager normalizes it afterwards.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Fetch `locator`, writing the result to `output`
    async fn fetch(&self, locator: &str, output: &Path) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// Fetcher that runs the external `yt-dlp` binary
///
/// # Examples
///
/// ```no_run
/// use flic_ingest::download::{VideoFetcher, YtDlpFetcher};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = YtDlpFetcher::from_path("bestvideo+bestaudio/best")
///     .ok_or("yt-dlp not found in PATH")?;
///
/// fetcher
///     .fetch("https://example.com/watch?v=abc", Path::new("videos/video_0.mp4"))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct YtDlpFetcher {
    binary_path: PathBuf,
    format: String,
}

/// How much of yt-dlp's stderr is kept in errors
const STDERR_TAIL: usize = 2000;

impl YtDlpFetcher {
    /// Create a fetcher with an explicit binary path
    pub fn new(binary_path: PathBuf, format: impl Into<String>) -> Self {
        Self {
            binary_path,
            format: format.into(),
        }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path(format: impl Into<String>) -> Option<Self> {
        which::which("yt-dlp")
            .ok()
            .map(|path| Self::new(path, format))
    }

    /// Path of the binary this fetcher runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn command(&self, locator: &str, output: &Path) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.arg("-f")
            .arg(&self.format)
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("--merge-output-format")
            .arg("mp4")
            .arg("-o")
            .arg(output)
            .arg("--")
            .arg(locator)
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl VideoFetcher for YtDlpFetcher {
    async fn fetch(&self, locator: &str, output: &Path) -> Result<()> {
        tracing::debug!(
            binary = %self.binary_path.display(),
            locator,
            output = %output.display(),
            "running yt-dlp"
        );

        let result = self
            .command(locator, output)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        if result.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr);
        let tail_start = stderr
            .char_indices()
            .rev()
            .nth(STDERR_TAIL)
            .map(|(i, _)| i)
            .unwrap_or(0);
        Err(DownloadError::ToolFailed {
            locator: locator.to_string(),
            status: result.status.to_string(),
            stderr: stderr[tail_start..].trim().to_string(),
        }
        .into())
    }

    fn name(&self) -> &str {
        "yt-dlp"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_matches_which() {
        let found = YtDlpFetcher::from_path("best");
        assert_eq!(found.is_some(), which::which("yt-dlp").is_ok());
    }

    #[test]
    fn command_carries_download_options() {
        let fetcher = YtDlpFetcher::new(PathBuf::from("/usr/bin/yt-dlp"), "bestvideo+bestaudio/best");
        let cmd = fetcher.command("https://example.com/v", Path::new("/videos/video_0.mp4"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "-f",
                "bestvideo+bestaudio/best",
                "--no-playlist",
                "--no-progress",
                "--merge-output-format",
                "mp4",
                "-o",
                "/videos/video_0.mp4",
                "--",
                "https://example.com/v",
            ]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_external_tool_error() {
        let fetcher = YtDlpFetcher::new(PathBuf::from("/nonexistent/yt-dlp-xyz"), "best");
        let err = fetcher
            .fetch("https://example.com/v", Path::new("/tmp/out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExternalTool(_)));
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("yt-dlp");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_writes_output() {
        let temp = tempfile::TempDir::new().unwrap();
        // writes "ok" to the path following -o
        let tool = fake_tool(
            temp.path(),
            "#!/bin/sh\nwhile [ \"$1\" != \"-o\" ]; do shift; done\nprintf ok > \"$2\"\n",
        );
        let output = temp.path().join("video_0.mp4");

        YtDlpFetcher::new(tool, "best")
            .fetch("https://example.com/v", &output)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"ok");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_run_reports_stderr() {
        let temp = tempfile::TempDir::new().unwrap();
        let tool = fake_tool(
            temp.path(),
            "#!/bin/sh\necho 'ERROR: Unsupported URL' >&2\nexit 1\n",
        );

        let err = YtDlpFetcher::new(tool, "best")
            .fetch("https://example.com/v", &temp.path().join("video_0.mp4"))
            .await
            .unwrap_err();

        match err {
            Error::Download(DownloadError::ToolFailed { locator, stderr, .. }) => {
                assert_eq!(locator, "https://example.com/v");
                assert_eq!(stderr, "ERROR: Unsupported URL");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
