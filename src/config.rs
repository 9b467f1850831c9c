//! Configuration types for flic-ingest

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Watched and quarantine directory settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory monitored for new videos (default: "./videos")
    #[serde(default = "default_watch_dir")]
    pub watch_dir: PathBuf,

    /// Directory failed files are moved to (default: "./failed_videos")
    #[serde(default = "default_quarantine_dir")]
    pub quarantine_dir: PathBuf,

    /// File extensions that trigger processing, without the dot (default: ["mp4"])
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Process files already sitting in the watched directory at startup (default: true)
    #[serde(default = "default_true")]
    pub scan_existing_on_start: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            watch_dir: default_watch_dir(),
            quarantine_dir: default_quarantine_dir(),
            extensions: default_extensions(),
            scan_existing_on_start: true,
        }
    }
}

impl WatchConfig {
    /// Whether `path` has one of the accepted extensions (case-insensitive)
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

/// Readiness detection settings
///
/// After a creation event the pipeline waits `grace_period`, then compares the file size
/// across samples `poll_interval` apart until two agree or `max_wait` elapses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Initial wait after the creation event (default: 2 seconds)
    #[serde(default = "default_grace_period", with = "duration_serde")]
    pub grace_period: Duration,

    /// Delay between size samples (default: 1 second)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Give up if the size is still changing after this long (default: 300 seconds)
    #[serde(default = "default_max_wait", with = "duration_serde")]
    pub max_wait: Duration,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            grace_period: default_grace_period(),
            poll_interval: default_poll_interval(),
            max_wait: default_max_wait(),
        }
    }
}

/// Remote API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API base address (default: "https://api.socialverseapp.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Static credential sent as the `Flic-Token` header
    #[serde(default)]
    pub token: String,

    /// Category assigned to created posts (default: 1)
    #[serde(default = "default_category_id")]
    pub category_id: i64,

    /// Timeout for the JSON calls (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for the byte upload (default: 600 seconds)
    #[serde(default = "default_upload_timeout", with = "duration_serde")]
    pub upload_timeout: Duration,

    /// Retry policy for the upload-target request and the upload itself
    ///
    /// Post creation is never retried.
    #[serde(default = "default_api_retry")]
    pub retry: RetryConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            category_id: default_category_id(),
            request_timeout: default_request_timeout(),
            upload_timeout: default_upload_timeout(),
            retry: default_api_retry(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A policy that makes exactly one attempt
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Which fetcher DownloadManager uses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetcherKind {
    /// yt-dlp when it can be found, plain HTTP otherwise (default)
    #[default]
    Auto,
    /// Always use yt-dlp
    YtDlp,
    /// Always fetch the locator as a direct file link
    Http,
}

/// Remote source fetching settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Fetcher selection
    #[serde(default)]
    pub fetcher: FetcherKind,

    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub yt_dlp_path: Option<PathBuf>,

    /// yt-dlp format selector (default: "bestvideo+bestaudio/best")
    #[serde(default = "default_format")]
    pub format: String,

    /// Maximum concurrent fetches (None = one task per request)
    #[serde(default)]
    pub max_concurrent: Option<usize>,

    /// Timeout for a single fetch (default: 3600 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch_timeout: Duration,

    /// Extensions a downloader may append when merging streams (default: mp4, mkv, webm)
    #[serde(default = "default_merge_extensions")]
    pub merge_extensions: Vec<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            fetcher: FetcherKind::default(),
            yt_dlp_path: None,
            format: default_format(),
            max_concurrent: None,
            fetch_timeout: default_fetch_timeout(),
            merge_extensions: default_merge_extensions(),
        }
    }
}

/// Pipeline runtime settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How long shutdown waits for in-flight files (default: 300 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: default_shutdown_timeout(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Main configuration
///
/// Constructed once at startup and shared by reference with the pipeline, the download
/// manager and the remote client. Every field has a default, so a TOML file only needs to
/// name what it changes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directories and file selection
    #[serde(default)]
    pub watch: WatchConfig,

    /// Readiness detection
    #[serde(default)]
    pub stability: StabilityConfig,

    /// Remote API
    #[serde(default)]
    pub api: ApiConfig,

    /// Remote source fetching
    #[serde(default)]
    pub download: DownloadConfig,

    /// Pipeline runtime
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load a config from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse a config from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Check the settings that cannot be defaulted sensibly
    pub fn validate(&self) -> Result<()> {
        if self.api.token.trim().is_empty() {
            return Err(Error::config("api.token", "API token must not be empty"));
        }
        let base = url::Url::parse(&self.api.base_url)
            .map_err(|e| Error::config("api.base_url", format!("invalid URL: {}", e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::config(
                "api.base_url",
                format!("unsupported scheme '{}'", base.scheme()),
            ));
        }
        if self.stability.poll_interval.is_zero() {
            return Err(Error::config(
                "stability.poll_interval",
                "poll interval must be greater than zero",
            ));
        }
        if self.watch.extensions.is_empty() {
            return Err(Error::config(
                "watch.extensions",
                "at least one extension is required",
            ));
        }
        if self.watch.watch_dir == self.watch.quarantine_dir {
            return Err(Error::config(
                "watch.quarantine_dir",
                "quarantine directory must differ from the watched directory",
            ));
        }
        if self.download.max_concurrent == Some(0) {
            return Err(Error::config(
                "download.max_concurrent",
                "must be at least 1 when set",
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_watch_dir() -> PathBuf {
    PathBuf::from("videos")
}

fn default_quarantine_dir() -> PathBuf {
    PathBuf::from("failed_videos")
}

fn default_extensions() -> Vec<String> {
    vec!["mp4".into()]
}

fn default_true() -> bool {
    true
}

fn default_grace_period() -> Duration {
    Duration::from_secs(2)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_wait() -> Duration {
    Duration::from_secs(300)
}

fn default_base_url() -> String {
    "https://api.socialverseapp.com".into()
}

fn default_category_id() -> i64 {
    1
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_api_retry() -> RetryConfig {
    RetryConfig::single_attempt()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_format() -> String {
    "bestvideo+bestaudio/best".into()
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(3600)
}

fn default_merge_extensions() -> Vec<String> {
    vec!["mp4".into(), "mkv".into(), "webm".into()]
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_event_channel_capacity() -> usize {
    1000
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.api.token = "flic_test".into();
        config
    }

    #[test]
    fn defaults_use_local_directories() {
        let config = Config::default();
        assert_eq!(config.watch.watch_dir, PathBuf::from("videos"));
        assert_eq!(config.watch.quarantine_dir, PathBuf::from("failed_videos"));
        assert_eq!(config.api.base_url, "https://api.socialverseapp.com");
        assert_eq!(config.api.category_id, 1);
        assert_eq!(config.stability.grace_period, Duration::from_secs(2));
        assert_eq!(config.api.retry.max_attempts, 0);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.watch.extensions, vec!["mp4".to_string()]);
        assert_eq!(config.download.fetcher, FetcherKind::Auto);
        assert_eq!(config.pipeline.event_channel_capacity, 1000);
    }

    #[test]
    fn toml_overrides_nested_fields() {
        let raw = r#"
            [watch]
            watch_dir = "/srv/in"
            quarantine_dir = "/srv/bad"

            [stability]
            grace_period = 5

            [api]
            token = "flic_abc"
            category_id = 7

            [api.retry]
            max_attempts = 3

            [download]
            fetcher = "yt_dlp"
            max_concurrent = 2
        "#;
        let config = Config::from_toml_str(raw).unwrap();
        assert_eq!(config.watch.watch_dir, PathBuf::from("/srv/in"));
        assert_eq!(config.stability.grace_period, Duration::from_secs(5));
        assert_eq!(config.stability.poll_interval, Duration::from_secs(1));
        assert_eq!(config.api.token, "flic_abc");
        assert_eq!(config.api.category_id, 7);
        assert_eq!(config.api.retry.max_attempts, 3);
        assert_eq!(config.download.fetcher, FetcherKind::YtDlp);
        assert_eq!(config.download.max_concurrent, Some(2));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::from_toml_str("[api\ntoken = 1").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn validate_accepts_defaults_with_token() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn validate_rejects_missing_token() {
        let err = Config::default().validate().unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("api.token")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = valid_config();
        config.api.base_url = "not a url".into();
        assert!(config.validate().is_err());

        config.api.base_url = "ftp://example.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_shared_directories() {
        let mut config = valid_config();
        config.watch.quarantine_dir = config.watch.watch_dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = valid_config();
        config.stability.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_matches_extension_case_insensitively() {
        let watch = WatchConfig::default();
        assert!(watch.accepts(Path::new("/v/a.mp4")));
        assert!(watch.accepts(Path::new("/v/a.MP4")));
        assert!(!watch.accepts(Path::new("/v/a.mkv")));
        assert!(!watch.accepts(Path::new("/v/mp4")));
    }

    #[test]
    fn duration_serde_serializes_as_seconds() {
        let json = serde_json::to_value(StabilityConfig::default()).unwrap();
        assert_eq!(json["grace_period"], 2);
        assert_eq!(json["max_wait"], 300);
    }
}
