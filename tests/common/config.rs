//! Test configuration helpers

use flic_ingest::Config;
use flic_ingest::config::FetcherKind;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Temporary directories plus a config pointing at them
pub struct TestEnv {
    /// Keeps the directories alive for the duration of the test
    pub temp: TempDir,
    /// Config with short stability timings
    pub config: Config,
}

impl TestEnv {
    /// Config targeting `api_base_url` with fast readiness checks and the HTTP fetcher
    pub fn new(api_base_url: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();

        let mut config = Config::default();
        config.watch.watch_dir = root.join("videos");
        config.watch.quarantine_dir = root.join("failed_videos");
        config.stability.grace_period = Duration::from_millis(50);
        config.stability.poll_interval = Duration::from_millis(50);
        config.stability.max_wait = Duration::from_secs(5);
        config.api.base_url = api_base_url.to_string();
        config.api.token = "test-token".to_string();
        config.api.request_timeout = Duration::from_secs(5);
        config.api.upload_timeout = Duration::from_secs(5);
        config.download.fetcher = FetcherKind::Http;
        config.pipeline.shutdown_timeout = Duration::from_secs(10);

        Self { temp, config }
    }

    /// The watched directory
    pub fn watch_dir(&self) -> PathBuf {
        self.config.watch.watch_dir.clone()
    }

    /// The quarantine directory
    pub fn quarantine_dir(&self) -> PathBuf {
        self.config.watch.quarantine_dir.clone()
    }

    /// Write a fake video into the watched directory
    pub fn drop_video(&self, name: &str, bytes: &[u8]) -> PathBuf {
        std::fs::create_dir_all(self.watch_dir()).unwrap();
        let path = self.watch_dir().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }
}
