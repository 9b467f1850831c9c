//! Remote API client interface
//!
//! The pipeline talks to the video platform only through [`RemoteApi`]. [`FlicClient`] is the
//! HTTP implementation; tests substitute in-memory doubles.

mod flic;

pub use flic::FlicClient;

use crate::error::RemoteError;
use crate::types::{NewPost, UploadTarget};
use async_trait::async_trait;
use std::path::Path;

/// Result type for remote calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// The three remote operations a video goes through
///
/// Each method is one logical attempt from the caller's point of view. Implementations may
/// retry internally, but must never repeat [`create_post`](RemoteApi::create_post) on their
/// own.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Ask for a fresh one-time upload destination
    async fn request_upload_target(&self) -> RemoteResult<UploadTarget>;

    /// Send the file's bytes to `target`, returning the HTTP status on success
    async fn upload(&self, target: &UploadTarget, file: &Path) -> RemoteResult<u16>;

    /// Create a post bound to uploaded content, returning the HTTP status on success
    async fn create_post(&self, post: &NewPost) -> RemoteResult<u16>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

impl RemoteError {
    /// HTTP status carried by this error, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
