//! Watched-directory event source
//!
//! The pipeline consumes file appearances through [`FileEventSource`]. [`DirectoryWatcher`]
//! is the `notify` adapter:
//! - Non-recursive (only the watched directory itself)
//! - Reports file creation and rename-into-place
//! - Filters on accepted extensions (case-insensitive)
//! - Skips downloader intermediates (`*.part`, `*.ytdl`, `*.temp.*`, `*.f137.*`, ...)
//!
//! No duplicate suppression happens here; the pipeline owns that.
//!
//! # Example
//!
//! ```no_run
//! use flic_ingest::config::Config;
//! use flic_ingest::watcher::{DirectoryWatcher, FileEventSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut watcher = DirectoryWatcher::new(&config)?;
//! watcher.start()?;
//!
//! while let Some(path) = watcher.next_created().await {
//!     println!("new file: {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Async source of newly appeared file paths
#[async_trait]
pub trait FileEventSource: Send {
    /// Next path that appeared, or None once the source is closed
    async fn next_created(&mut self) -> Option<PathBuf>;
}

#[async_trait]
impl FileEventSource for mpsc::Receiver<PathBuf> {
    async fn next_created(&mut self) -> Option<PathBuf> {
        self.recv().await
    }
}

#[async_trait]
impl FileEventSource for mpsc::UnboundedReceiver<PathBuf> {
    async fn next_created(&mut self) -> Option<PathBuf> {
        self.recv().await
    }
}

/// Decides which paths are videos worth processing
#[derive(Clone, Debug)]
pub struct FileFilter {
    extensions: Vec<String>,
    intermediate: Regex,
}

impl FileFilter {
    /// Build a filter from the watch and download settings
    ///
    /// # Errors
    /// Returns a config error if a merge extension produces an invalid pattern.
    pub fn new(config: &Config) -> Result<Self> {
        let merge = config
            .download
            .merge_extensions
            .iter()
            .map(|ext| regex::escape(ext.trim_start_matches('.')))
            .collect::<Vec<_>>()
            .join("|");

        // partial downloads, per-format fragments, and merge leftovers like name.mp4.mkv
        let mut pattern = String::from(r"(?i)\.(part|ytdl|temp|tmp)(\.|$)|\.f\d+\.[a-z0-9]+$");
        if !merge.is_empty() {
            pattern.push_str(&format!(r"|\.({})\.[a-z0-9]+$", merge));
        }

        let intermediate = Regex::new(&pattern).map_err(|e| {
            Error::config(
                "download.merge_extensions",
                format!("invalid intermediate-file pattern: {}", e),
            )
        })?;

        Ok(Self {
            extensions: config.watch.extensions.clone(),
            intermediate,
        })
    }

    /// Whether `path` names a finished video
    pub fn accepts(&self, path: &Path) -> bool {
        let has_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if !has_extension {
            return false;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };
        !name.starts_with('.') && !self.intermediate.is_match(name)
    }

    /// Paths from a notify event that represent a newly appeared video
    pub fn paths_from_event(&self, event: Event) -> Vec<PathBuf> {
        let candidates = match event.kind {
            EventKind::Create(CreateKind::File | CreateKind::Any) => event.paths,
            // Both carries [from, to]; only the destination is new
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                event.paths.into_iter().last().into_iter().collect()
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths,
            // Backends that cannot tell sides apart; keep whichever side still exists
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
                event.paths.into_iter().filter(|p| p.is_file()).collect()
            }
            _ => Vec::new(),
        };

        candidates.into_iter().filter(|p| self.accepts(p)).collect()
    }
}

/// Watches one directory for new video files
pub struct DirectoryWatcher {
    /// Filesystem watcher instance; dropping it stops the watch
    watcher: RecommendedWatcher,

    /// Channel for receiving filesystem events
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,

    filter: FileFilter,

    /// Accepted paths not yet handed out
    pending: VecDeque<PathBuf>,

    dir: PathBuf,
}

impl DirectoryWatcher {
    /// Create a watcher for `config.watch.watch_dir`
    ///
    /// Nothing is watched until [`start`](Self::start) is called.
    ///
    /// # Errors
    /// Returns error if the filesystem watcher cannot be initialized
    pub fn new(config: &Config) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                if let Err(e) = tx.send(res) {
                    error!("Failed to send filesystem event: {}", e);
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::FolderWatch(e.to_string()))?;

        Ok(Self {
            watcher,
            rx,
            filter: FileFilter::new(config)?,
            pending: VecDeque::new(),
            dir: config.watch.watch_dir.clone(),
        })
    }

    /// Start watching, creating the directory if needed
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or watched
    pub fn start(&mut self) -> Result<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|e| {
                Error::FolderWatch(format!("Failed to create watch folder: {}", e))
            })?;
            info!("Created watch folder: {}", self.dir.display());
        }

        self.watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::FolderWatch(format!("Failed to watch folder: {}", e)))?;

        info!("Watching folder: {}", self.dir.display());
        Ok(())
    }

    /// The watched directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The filter applied to events
    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }
}

#[async_trait]
impl FileEventSource for DirectoryWatcher {
    async fn next_created(&mut self) -> Option<PathBuf> {
        loop {
            if let Some(path) = self.pending.pop_front() {
                return Some(path);
            }

            match self.rx.recv().await? {
                Ok(event) => {
                    let paths = self.filter.paths_from_event(event);
                    for path in &paths {
                        debug!(path = %path.display(), "video appeared");
                    }
                    self.pending.extend(paths);
                }
                Err(e) => error!("Filesystem watcher error: {}", e),
            }
        }
    }
}

/// Accepted files already present in `dir`, sorted by name
///
/// # Errors
/// Returns error if the directory cannot be listed
pub async fn existing_files(dir: &Path, filter: &FileFilter) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && filter.accepts(&path) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
