//! Core types for flic-ingest

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Lifecycle state of a file under pipeline control
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    /// Creation event observed
    Detected,
    /// Waiting for the file to stop changing
    AwaitingStability,
    /// File confirmed present and stable
    Ready,
    /// Upload target requested from the remote API
    RequestingTarget,
    /// Bytes being sent to the upload target
    Uploading,
    /// Post being created for the uploaded content
    CreatingPost,
    /// Post created; file deleted (terminal)
    Completed,
    /// A step failed; file routed to quarantine (terminal)
    Failed,
}

impl FileState {
    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(self, FileState::Completed | FileState::Failed)
    }

    /// The state a successful step leads to, if any
    pub fn next(self) -> Option<FileState> {
        match self {
            FileState::Detected => Some(FileState::AwaitingStability),
            FileState::AwaitingStability => Some(FileState::Ready),
            FileState::Ready => Some(FileState::RequestingTarget),
            FileState::RequestingTarget => Some(FileState::Uploading),
            FileState::Uploading => Some(FileState::CreatingPost),
            FileState::CreatingPost => Some(FileState::Completed),
            FileState::Completed | FileState::Failed => None,
        }
    }

    /// Whether `self -> to` is a legal transition
    pub fn can_transition_to(self, to: FileState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == FileState::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileState::Detected => "detected",
            FileState::AwaitingStability => "awaiting_stability",
            FileState::Ready => "ready",
            FileState::RequestingTarget => "requesting_target",
            FileState::Uploading => "uploading",
            FileState::CreatingPost => "creating_post",
            FileState::Completed => "completed",
            FileState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One file under pipeline control
#[derive(Clone, Debug)]
pub struct VideoFile {
    path: PathBuf,
    state: FileState,
}

impl VideoFile {
    /// Start tracking a freshly detected file
    pub fn detected(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: FileState::Detected,
        }
    }

    /// Absolute path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state
    pub fn state(&self) -> FileState {
        self.state
    }

    /// Base filename, used as the post title
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Move to `to`, returning the previous state
    ///
    /// Transitions are monotonic: only the successor state or `Failed` is accepted, and
    /// nothing leaves a terminal state.
    pub fn advance(&mut self, to: FileState) -> Result<FileState> {
        if !self.state.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                path: self.path.clone(),
                from: self.state,
                to,
            });
        }
        let from = self.state;
        self.state = to;
        Ok(from)
    }
}

/// One-time upload destination issued by the remote API
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    /// Where the raw bytes are PUT
    pub url: String,
    /// Content identifier bound to the uploaded bytes
    pub hash: String,
}

/// Body of a post-creation request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    /// Post title (the file's base name)
    pub title: String,
    /// Content hash from the upload target
    pub hash: String,
    /// Always false for posts created by this tool
    pub is_available_in_public_feed: bool,
    /// Category the post is filed under
    pub category_id: i64,
}

impl NewPost {
    /// Build a private post for uploaded content
    pub fn private(title: impl Into<String>, hash: impl Into<String>, category_id: i64) -> Self {
        Self {
            title: title.into(),
            hash: hash.into(),
            is_available_in_public_feed: false,
            category_id,
        }
    }
}

/// One entry in a user-submitted download batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Remote video address
    pub source_locator: String,
    /// File name the result must have in the watched directory
    pub target_name: String,
}

impl DownloadRequest {
    /// Create a request with an explicit target name
    pub fn new(source_locator: impl Into<String>, target_name: impl Into<String>) -> Self {
        Self {
            source_locator: source_locator.into(),
            target_name: target_name.into(),
        }
    }

    /// Build index-named requests (`video_0.mp4`, `video_1.mp4`, ...)
    ///
    /// Blank locators are dropped before indexing.
    pub fn batch<I, S>(locators: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        locators
            .into_iter()
            .filter_map(|l| {
                let trimmed = l.as_ref().trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .enumerate()
            .map(|(i, locator)| Self::new(locator, format!("video_{}.mp4", i)))
            .collect()
    }
}

/// Result of one fetch in a batch
#[derive(Debug)]
pub struct DownloadOutcome {
    /// The request this outcome belongs to
    pub request: DownloadRequest,
    /// Final path in the watched directory, or why the fetch failed
    pub result: Result<PathBuf>,
}

impl DownloadOutcome {
    /// Whether the fetch produced its file
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of processing one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Post created and file deleted
    Completed,
    /// A step failed and the file now lives in quarantine
    Quarantined {
        /// Where the file was moved (None if it was already gone)
        destination: Option<PathBuf>,
    },
    /// A step failed and the file could not be moved; it stays where it was
    QuarantineFailed {
        /// Why the move failed
        error: String,
    },
    /// Another workflow already owns this path
    AlreadyActive,
    /// Shutdown arrived during the stability wait; the file was left untouched
    Deferred,
    /// The pipeline is shutting down and no longer accepts paths
    Rejected,
}

impl Outcome {
    /// Whether this outcome ends in the `Failed` state
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Outcome::Quarantined { .. } | Outcome::QuarantineFailed { .. }
        )
    }
}

/// Counters describing pipeline activity since startup
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Files whose post was created
    pub completed: u64,
    /// Files moved to quarantine
    pub quarantined: u64,
    /// Files that failed and could not be moved
    pub quarantine_failed: u64,
    /// Files that failed and were already gone, so nothing was quarantined
    pub vanished: u64,
    /// Events dropped because the path was already being processed
    pub duplicates_suppressed: u64,
    /// Workflows currently running
    pub in_flight: usize,
}

/// Event emitted by the pipeline
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A path was claimed for processing
    FileDetected {
        /// The file
        path: PathBuf,
    },

    /// A file moved between states
    StateChanged {
        /// The file
        path: PathBuf,
        /// Previous state
        from: FileState,
        /// New state
        to: FileState,
    },

    /// A remote call finished
    RemoteCall {
        /// The file the call was made for
        path: PathBuf,
        /// Operation name
        operation: String,
        /// HTTP status, if a response was received
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        /// Whether the call succeeded
        success: bool,
    },

    /// File processed and deleted
    Completed {
        /// The file
        path: PathBuf,
        /// Title of the created post
        title: String,
    },

    /// File moved to quarantine
    Quarantined {
        /// Original location
        path: PathBuf,
        /// Quarantine location (None if the file was already gone)
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PathBuf>,
        /// Why processing failed
        reason: String,
    },

    /// File failed and could not be quarantined
    QuarantineFailed {
        /// The file, still at its original location
        path: PathBuf,
        /// Why the move failed
        error: String,
    },

    /// Pipeline drained and stopped
    Shutdown,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_every_state_in_order() {
        let mut file = VideoFile::detected("/videos/video_0.mp4");
        let mut seen = vec![file.state()];
        while let Some(next) = file.state().next() {
            file.advance(next).unwrap();
            seen.push(file.state());
        }
        assert_eq!(
            seen,
            vec![
                FileState::Detected,
                FileState::AwaitingStability,
                FileState::Ready,
                FileState::RequestingTarget,
                FileState::Uploading,
                FileState::CreatingPost,
                FileState::Completed,
            ]
        );
    }

    #[test]
    fn any_live_state_may_fail() {
        for state in [
            FileState::Detected,
            FileState::AwaitingStability,
            FileState::Ready,
            FileState::RequestingTarget,
            FileState::Uploading,
            FileState::CreatingPost,
        ] {
            assert!(state.can_transition_to(FileState::Failed), "{state}");
        }
    }

    #[test]
    fn terminal_states_are_final() {
        let mut file = VideoFile::detected("/videos/a.mp4");
        file.advance(FileState::Failed).unwrap();
        assert!(file.advance(FileState::Failed).is_err());
        assert!(file.advance(FileState::AwaitingStability).is_err());
        assert!(!FileState::Completed.can_transition_to(FileState::Failed));
    }

    #[test]
    fn skipping_or_reentering_states_is_rejected() {
        let mut file = VideoFile::detected("/videos/a.mp4");
        let err = file.advance(FileState::Uploading).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        file.advance(FileState::AwaitingStability).unwrap();
        assert!(file.advance(FileState::Detected).is_err());
        assert_eq!(file.state(), FileState::AwaitingStability);
    }

    #[test]
    fn batch_names_by_index_and_skips_blanks() {
        let requests = DownloadRequest::batch(["https://a/1", "  ", "https://a/2 "]);
        assert_eq!(
            requests,
            vec![
                DownloadRequest::new("https://a/1", "video_0.mp4"),
                DownloadRequest::new("https://a/2", "video_1.mp4"),
            ]
        );
    }

    #[test]
    fn new_post_serializes_with_wire_field_names() {
        let post = NewPost::private("video_0.mp4", "abc123", 1);
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "video_0.mp4",
                "hash": "abc123",
                "is_available_in_public_feed": false,
                "category_id": 1
            })
        );
    }

    #[test]
    fn file_name_is_base_name() {
        let file = VideoFile::detected("/videos/clip.mp4");
        assert_eq!(file.file_name(), "clip.mp4");
    }
}
