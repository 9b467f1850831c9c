//! # flic-ingest
//!
//! Watch-folder video ingestion: fetch videos into a directory, then upload every file that
//! appears there and publish it as a post.
//!
//! ## How a file moves
//!
//! 1. A new file appears in the watched directory (fetched by [`DownloadManager`] or dropped
//!    there by anything else)
//! 2. The pipeline waits until the file stops changing
//! 3. It requests a one-time upload target, uploads the bytes, and creates a post
//! 4. On success the local file is deleted; on any failure it is moved to the quarantine
//!    directory
//!
//! A given path never has two workflows running at once, and every tracked file ends up
//! either deleted or quarantined.
//!
//! ## Quick Start
//!
//! ```no_run
//! use flic_ingest::{Config, DownloadRequest, Orchestrator, wait_for_signal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.api.token = "flic-token".to_string();
//!
//!     let orchestrator = Orchestrator::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.pipeline().subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let requests = DownloadRequest::batch(["https://example.com/watch?v=abc"]);
//!     orchestrator.run(requests, wait_for_signal()).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Fetching remote videos into the watched directory
pub mod download;
/// Error types
pub mod error;
/// Top-level wiring of one run
pub mod orchestrator;
/// Per-file ingestion workflow
pub mod pipeline;
/// Remote API client
pub mod remote;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Watched-directory event source
pub mod watcher;

// Re-export commonly used types
pub use config::Config;
pub use download::{DownloadManager, HttpFetcher, VideoFetcher, YtDlpFetcher};
pub use error::{
    DownloadError, Error, FailureClass, QuarantineError, RemoteError, RemoteOperation, Result,
    StabilityError,
};
pub use orchestrator::Orchestrator;
pub use pipeline::{FailureRouter, IngestionPipeline, QuarantineOutcome};
pub use remote::{FlicClient, RemoteApi};
pub use types::{
    DownloadOutcome, DownloadRequest, Event, FileState, NewPost, Outcome, PipelineStats,
    UploadTarget, VideoFile,
};
pub use watcher::{DirectoryWatcher, FileEventSource};

/// Wait for a termination signal
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

/// Wait for a termination signal (Ctrl+C)
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
