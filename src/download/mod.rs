//! Batch fetching of remote videos into the watched directory.
//!
//! - [`fetcher`] - The [`VideoFetcher`] trait and the yt-dlp implementation
//! - [`http`] - Direct-link fetcher
//! - [`normalize`] - Renaming merged outputs back to the requested name
//!
//! Downloads never call the pipeline directly: a finished file appears in the watched
//! directory and the watcher picks it up from there.

pub mod fetcher;
pub mod http;
pub mod normalize;

pub use fetcher::{VideoFetcher, YtDlpFetcher};
pub use http::HttpFetcher;
pub use normalize::normalize_output;

use crate::config::{Config, DownloadConfig, FetcherKind};
use crate::error::{DownloadError, Error, Result};
use crate::types::{DownloadOutcome, DownloadRequest};
use futures::future::join_all;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Fetches batches of videos concurrently into one directory
pub struct DownloadManager {
    fetcher: Arc<dyn VideoFetcher>,
    watch_dir: PathBuf,
    config: DownloadConfig,
    /// Bound on simultaneous fetches, if configured
    limit: Option<Arc<Semaphore>>,
}

impl DownloadManager {
    /// Create a manager that writes into `watch_dir` using `fetcher`
    pub fn new(
        fetcher: Arc<dyn VideoFetcher>,
        watch_dir: impl Into<PathBuf>,
        config: DownloadConfig,
    ) -> Self {
        let limit = config
            .max_concurrent
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        Self {
            fetcher,
            watch_dir: watch_dir.into(),
            config,
            limit,
        }
    }

    /// Create a manager with the fetcher selected by `config.download.fetcher`
    ///
    /// # Errors
    /// Returns a config error if yt-dlp is required but cannot be found
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = select_fetcher(&config.download)?;
        Ok(Self::new(
            fetcher,
            config.watch.watch_dir.clone(),
            config.download.clone(),
        ))
    }

    /// Name of the fetcher in use
    pub fn fetcher_name(&self) -> &str {
        self.fetcher.name()
    }

    /// Fetch every request concurrently, returning outcomes in input order
    ///
    /// A failed fetch does not cancel the others.
    pub async fn fetch_all(&self, requests: Vec<DownloadRequest>) -> Vec<DownloadOutcome> {
        if requests.is_empty() {
            return Vec::new();
        }
        tracing::info!(
            count = requests.len(),
            fetcher = self.fetcher.name(),
            "Starting downloads"
        );

        join_all(requests.into_iter().map(|request| async move {
            let result = self.fetch_one(&request).await;
            match &result {
                Ok(path) => tracing::info!(
                    locator = %request.source_locator,
                    path = %path.display(),
                    "Downloaded"
                ),
                Err(e) => tracing::error!(
                    locator = %request.source_locator,
                    target = %request.target_name,
                    error = %e,
                    "Download failed"
                ),
            }
            DownloadOutcome { request, result }
        }))
        .await
    }

    async fn fetch_one(&self, request: &DownloadRequest) -> Result<PathBuf> {
        validate_target_name(&request.target_name)?;

        let _permit = match &self.limit {
            Some(limit) => Some(
                Arc::clone(limit)
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Other(format!("download limiter closed: {}", e)))?,
            ),
            None => None,
        };

        let output = self.watch_dir.join(&request.target_name);
        tracing::debug!(locator = %request.source_locator, output = %output.display(), "fetching");

        let timeout = self.config.fetch_timeout;
        match tokio::time::timeout(timeout, self.fetcher.fetch(&request.source_locator, &output))
            .await
        {
            Ok(fetched) => fetched?,
            Err(_) => {
                return Err(DownloadError::Timeout {
                    locator: request.source_locator.clone(),
                    timeout,
                }
                .into());
            }
        }

        normalize_output(
            &self.watch_dir,
            &request.target_name,
            &self.config.merge_extensions,
        )
        .await
    }
}

/// Pick the fetcher described by `config`
///
/// `Auto` prefers yt-dlp (configured path, then PATH) and falls back to direct HTTP.
///
/// # Errors
/// Returns a config error if `YtDlp` is requested and no binary can be found
pub fn select_fetcher(config: &DownloadConfig) -> Result<Arc<dyn VideoFetcher>> {
    let yt_dlp = || match &config.yt_dlp_path {
        Some(path) => Some(YtDlpFetcher::new(path.clone(), config.format.clone())),
        None => YtDlpFetcher::from_path(config.format.clone()),
    };

    match config.fetcher {
        FetcherKind::YtDlp => match yt_dlp() {
            Some(fetcher) => Ok(Arc::new(fetcher)),
            None => Err(Error::config(
                "download.fetcher",
                "yt-dlp not found in PATH; install it or set download.yt_dlp_path",
            )),
        },
        FetcherKind::Http => Ok(Arc::new(HttpFetcher::new())),
        FetcherKind::Auto => match yt_dlp() {
            Some(fetcher) => {
                tracing::info!(binary = %fetcher.binary_path().display(), "using yt-dlp for downloads");
                Ok(Arc::new(fetcher))
            }
            None => {
                tracing::warn!("yt-dlp not found, falling back to direct HTTP downloads");
                Ok(Arc::new(HttpFetcher::new()))
            }
        },
    }
}

/// Target names must be a single plain file name inside the watched directory
fn validate_target_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(DownloadError::InvalidTargetName {
            name: name.to_string(),
        }
        .into()),
    }
}
