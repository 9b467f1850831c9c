//! Error types for flic-ingest
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (remote API, quarantine, download)
//! - Classification of every error into the pipeline's failure taxonomy
//! - Context information (operation, file path, HTTP status, etc.)

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for flic-ingest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for flic-ingest
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api.base_url")
        key: Option<String>,
    },

    /// Remote API call failed
    #[error("remote API error: {0}")]
    Remote(#[from] RemoteError),

    /// Moving a failed file into quarantine failed
    #[error("quarantine error: {0}")]
    Quarantine(#[from] QuarantineError),

    /// Fetching a remote source into the watched directory failed
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// File did not become ready for upload
    #[error("file not ready: {0}")]
    NotReady(#[from] StabilityError),

    /// Illegal state machine transition
    #[error("invalid transition for {path}: {from} -> {to}")]
    InvalidTransition {
        /// The file whose transition was rejected
        path: PathBuf,
        /// State the file was in
        from: crate::types::FileState,
        /// State that was requested
        to: crate::types::FileState,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Config file could not be parsed
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Folder watching error
    #[error("folder watch error: {0}")]
    FolderWatch(String),

    /// External tool execution failed (yt-dlp)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// The three remote operations a file passes through
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteOperation {
    /// `GET /posts/generate-upload-url`
    RequestUploadTarget,
    /// `PUT <upload url>`
    Upload,
    /// `POST /posts`
    CreatePost,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteOperation::RequestUploadTarget => "request_upload_target",
            RemoteOperation::Upload => "upload",
            RemoteOperation::CreatePost => "create_post",
        };
        f.write_str(s)
    }
}

/// Remote API errors
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Server answered with a non-2xx status
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        /// The operation that failed
        operation: RemoteOperation,
        /// HTTP status code
        status: u16,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Request could not be sent or the response could not be read
    #[error("{operation} transport error: {source}")]
    Transport {
        /// The operation that failed
        operation: RemoteOperation,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// No response within the configured timeout
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// The operation that timed out
        operation: RemoteOperation,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// 2xx response whose body was not what the API promises
    #[error("{operation} returned an invalid response: {reason}")]
    InvalidResponse {
        /// The operation that failed
        operation: RemoteOperation,
        /// What was wrong with the body
        reason: String,
    },

    /// Local file could not be opened for upload
    #[error("cannot read {path} for upload: {reason}")]
    SourceUnreadable {
        /// The file being uploaded
        path: PathBuf,
        /// The reason it could not be read
        reason: String,
    },
}

impl RemoteError {
    /// The operation this error belongs to, if any
    pub fn operation(&self) -> RemoteOperation {
        match self {
            RemoteError::Status { operation, .. }
            | RemoteError::Transport { operation, .. }
            | RemoteError::Timeout { operation, .. }
            | RemoteError::InvalidResponse { operation, .. } => *operation,
            RemoteError::SourceUnreadable { .. } => RemoteOperation::Upload,
        }
    }
}

/// Quarantine (failure routing) errors
#[derive(Debug, Error)]
pub enum QuarantineError {
    /// Quarantine directory could not be created
    #[error("failed to create quarantine directory {path}: {reason}")]
    CreateDirFailed {
        /// The quarantine directory
        path: PathBuf,
        /// The reason creation failed
        reason: String,
    },

    /// File move/rename failed
    #[error("failed to move {source_path} to {dest_path}: {reason}")]
    MoveFailed {
        /// The source path of the file being moved
        source_path: PathBuf,
        /// The destination path where the file should be moved
        dest_path: PathBuf,
        /// The reason the move failed
        reason: String,
    },

    /// Every candidate name in quarantine is taken
    #[error("file collision at {path}: {reason}")]
    FileCollision {
        /// The path where the collision occurred
        path: PathBuf,
        /// The reason for the collision
        reason: String,
    },

    /// Invalid path encountered
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The invalid path that was encountered
        path: PathBuf,
        /// The reason the path is invalid
        reason: String,
    },
}

/// Errors fetching a remote source into the watched directory
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The downloader process exited unsuccessfully
    #[error("downloader failed for {locator} ({status}): {stderr}")]
    ToolFailed {
        /// The source locator
        locator: String,
        /// Exit status description
        status: String,
        /// Tail of the downloader's stderr
        stderr: String,
    },

    /// HTTP fetch answered with a non-2xx status
    #[error("HTTP {status} fetching {locator}")]
    HttpStatus {
        /// The source locator
        locator: String,
        /// HTTP status code
        status: u16,
    },

    /// Fetch exceeded the configured timeout
    #[error("fetching {locator} timed out after {timeout:?}")]
    Timeout {
        /// The source locator
        locator: String,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// Downloader finished but no output file matches the requested name
    #[error("no output found for {expected}")]
    OutputMissing {
        /// The path the file should have landed at
        expected: PathBuf,
    },

    /// Renaming the downloader's output to the requested name failed
    #[error("failed to rename {from} to {to}: {reason}")]
    NormalizeFailed {
        /// The merged output name
        from: PathBuf,
        /// The requested name
        to: PathBuf,
        /// The reason the rename failed
        reason: String,
    },

    /// Requested target name is not a plain file name
    #[error("invalid target name {name:?}")]
    InvalidTargetName {
        /// The rejected name
        name: String,
    },
}

/// Readiness (stability wait) failures
#[derive(Debug, Error)]
pub enum StabilityError {
    /// File was absent when sampled
    #[error("file missing: {path}")]
    Missing {
        /// The file that was expected
        path: PathBuf,
    },

    /// File metadata could not be read
    #[error("cannot inspect {path}: {reason}")]
    Unreadable {
        /// The file being watched
        path: PathBuf,
        /// The underlying I/O error
        reason: String,
    },

    /// File size kept changing until the wait limit
    #[error("file never stabilized within {waited:?}: {path}")]
    NeverStable {
        /// The file being watched
        path: PathBuf,
        /// How long the pipeline waited
        waited: Duration,
    },
}

/// Failure taxonomy used for routing and reporting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// Local file not ready, or non-fatal cleanup failure
    TransientIo,
    /// Any of the three remote operations failed
    RemoteFailure,
    /// Moving a file on disk failed
    FileSystemFailure,
    /// Startup, configuration, or programming errors
    Fatal,
}

impl Error {
    /// Classify this error into the pipeline failure taxonomy
    pub fn class(&self) -> FailureClass {
        match self {
            Error::NotReady(_) => FailureClass::TransientIo,
            Error::Io(_) => FailureClass::TransientIo,
            Error::Remote(_) | Error::Network(_) => FailureClass::RemoteFailure,
            Error::Quarantine(_) => FailureClass::FileSystemFailure,
            Error::Download(_) | Error::ExternalTool(_) => FailureClass::TransientIo,
            Error::Config { .. }
            | Error::ConfigParse(_)
            | Error::InvalidTransition { .. }
            | Error::FolderWatch(_)
            | Error::Other(_) => FailureClass::Fatal,
        }
    }

    /// Shorthand for a configuration error tied to a key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}
