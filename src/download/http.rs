//! Direct-link fetcher over plain HTTP

use super::fetcher::VideoFetcher;
use crate::error::{DownloadError, Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Fetcher for locators that point straight at a video file
///
/// The body is streamed into `<output>.part` and renamed into place once complete, so the
/// watched directory only ever sees a finished file appear.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher that reuses `client`
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn stream_to(&self, locator: &str, partial: &Path) -> Result<u64> {
        let response = self.client.get(locator).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                locator: locator.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let mut file = tokio::fs::File::create(partial).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Removes the partial file on drop unless it was renamed into place
///
/// Runs on error returns and when the fetch future is dropped mid-stream (for example by a
/// fetch timeout).
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove partial download"
            );
        }
    }
}

#[async_trait]
impl VideoFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str, output: &Path) -> Result<()> {
        let mut partial = PartialFile::new(partial_path(output));

        let bytes = self.stream_to(locator, &partial.path).await?;
        tokio::fs::rename(&partial.path, output)
            .await
            .map_err(Error::Io)?;
        partial.disarm();

        tracing::debug!(locator, output = %output.display(), bytes, "direct download finished");
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
