//! Process-level wiring: directories, watcher, pipeline, and the download batch.

use crate::config::Config;
use crate::download::DownloadManager;
use crate::error::{Error, Result};
use crate::pipeline::IngestionPipeline;
use crate::remote::{FlicClient, RemoteApi};
use crate::types::DownloadRequest;
use crate::watcher::{DirectoryWatcher, existing_files};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Owns every long-lived component of one run
pub struct Orchestrator {
    config: Arc<Config>,
    pipeline: IngestionPipeline,
    downloads: DownloadManager,
}

impl Orchestrator {
    /// Validate `config`, prepare both directories, and build the HTTP client and fetcher
    ///
    /// # Errors
    /// Returns error if the config is invalid, a directory cannot be created, or the
    /// requested fetcher is unavailable
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let config = prepare_directories(config)?;
        let remote: Arc<dyn RemoteApi> = Arc::new(FlicClient::new(&config.api)?);
        let downloads = DownloadManager::from_config(&config)?;
        Ok(Self::with_parts(config, remote, downloads))
    }

    /// Assemble from already-built parts
    ///
    /// Directories are used as given.
    pub fn with_parts(config: Config, remote: Arc<dyn RemoteApi>, downloads: DownloadManager) -> Self {
        let config = Arc::new(config);
        let pipeline = IngestionPipeline::new(Arc::clone(&config), remote);
        Self {
            config,
            pipeline,
            downloads,
        }
    }

    /// The pipeline, for subscribing to events or reading stats
    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    /// The effective configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Watch, fetch `requests`, and keep processing until `shutdown_signal` resolves
    ///
    /// The watcher is registered before anything is fetched so no download can land unseen.
    /// Files already in the watched directory are dispatched once when
    /// `watch.scan_existing_on_start` is set.
    ///
    /// # Errors
    /// Returns error if the watched directory cannot be watched or scanned
    pub async fn run<F>(&self, requests: Vec<DownloadRequest>, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut watcher = DirectoryWatcher::new(&self.config)?;
        watcher.start()?;

        if self.config.watch.scan_existing_on_start {
            let existing = existing_files(watcher.dir(), watcher.filter()).await?;
            if !existing.is_empty() {
                tracing::info!(count = existing.len(), "Processing files already in watch folder");
            }
            for path in existing {
                drop(self.pipeline.dispatch(path));
            }
        }

        let watch_task = {
            let pipeline = self.pipeline.clone();
            tokio::spawn(async move { pipeline.run(watcher).await })
        };

        tokio::pin!(shutdown_signal);
        tokio::select! {
            outcomes = self.downloads.fetch_all(requests) => {
                if !outcomes.is_empty() {
                    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
                    tracing::info!(
                        succeeded,
                        failed = outcomes.len() - succeeded,
                        "Downloads finished"
                    );
                }
                shutdown_signal.await;
            }
            _ = &mut shutdown_signal => {
                tracing::info!("Interrupted during downloads");
            }
        }

        self.pipeline.shutdown().await;
        if let Err(e) = watch_task.await {
            tracing::error!(error = %e, "watch task ended abnormally");
        }

        let stats = self.pipeline.stats();
        tracing::info!(
            completed = stats.completed,
            quarantined = stats.quarantined,
            quarantine_failed = stats.quarantine_failed,
            vanished = stats.vanished,
            "Stopped"
        );
        Ok(())
    }
}

/// Create both directories and make their paths absolute
///
/// Event paths and scanned paths are then directly comparable.
fn prepare_directories(mut config: Config) -> Result<Config> {
    config.watch.watch_dir = ensure_dir(&config.watch.watch_dir, "watch.watch_dir")?;
    config.watch.quarantine_dir = ensure_dir(&config.watch.quarantine_dir, "watch.quarantine_dir")?;

    if config.watch.watch_dir == config.watch.quarantine_dir {
        return Err(Error::config(
            "watch.quarantine_dir",
            "quarantine directory must differ from the watched directory",
        ));
    }
    Ok(config)
}

fn ensure_dir(dir: &Path, key: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .and_then(|()| dir.canonicalize())
        .map_err(|e| Error::config(key, format!("cannot use {}: {}", dir.display(), e)))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetcherKind;
    use tempfile::TempDir;

    fn config_in(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.watch.watch_dir = temp.path().join("videos");
        config.watch.quarantine_dir = temp.path().join("failed_videos");
        config.api.token = "test-token".into();
        config.download.fetcher = FetcherKind::Http;
        config
    }

    #[test]
    fn new_creates_both_directories() {
        let temp = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(config_in(&temp)).unwrap();

        let config = orchestrator.config();
        assert!(config.watch.watch_dir.is_absolute());
        assert!(config.watch.watch_dir.is_dir());
        assert!(config.watch.quarantine_dir.is_dir());
    }

    #[test]
    fn new_rejects_missing_token() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(&temp);
        config.api.token.clear();

        assert!(matches!(
            Orchestrator::new(config),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn same_directory_through_different_spellings_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut config = config_in(&temp);
        config.watch.quarantine_dir = temp.path().join("videos").join(".");

        assert!(matches!(
            Orchestrator::new(config),
            Err(Error::Config { .. })
        ));
    }
}
