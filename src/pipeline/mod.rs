//! Per-file ingestion workflow.
//!
//! The `IngestionPipeline` struct and its methods are organized by concern:
//! - [`stability`] - Readiness wait before a file is touched
//! - [`router`] - Quarantine of failed files
//! - `claims` - One active workflow per path
//! - `workflow` - The state machine driving a single file to a terminal state

mod claims;
pub mod router;
pub mod stability;
mod workflow;


pub use router::{FailureRouter, QuarantineOutcome};
pub use stability::wait_for_stability;

use crate::config::Config;
use crate::remote::RemoteApi;
use crate::types::{Event, Outcome, PipelineStats};
use crate::watcher::FileEventSource;
use claims::{Claim, ClaimSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Running totals behind [`IngestionPipeline::stats`]
#[derive(Clone, Default)]
pub(crate) struct Counters {
    pub(crate) completed: Arc<AtomicU64>,
    pub(crate) quarantined: Arc<AtomicU64>,
    pub(crate) quarantine_failed: Arc<AtomicU64>,
    pub(crate) vanished: Arc<AtomicU64>,
    pub(crate) duplicates_suppressed: Arc<AtomicU64>,
}

/// Drives detected files through upload and post creation (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct IngestionPipeline {
    /// Configuration shared with the rest of the process
    pub(crate) config: Arc<Config>,
    /// Remote API used for the three network steps
    pub(crate) remote: Arc<dyn RemoteApi>,
    /// Destination for failed files
    pub(crate) router: FailureRouter,
    /// Paths that currently have an active workflow
    claims: ClaimSet,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Spawned workflows, awaited on shutdown
    tasks: TaskTracker,
    /// Cancelled once shutdown begins
    pub(crate) shutdown: CancellationToken,
    /// Flag to indicate whether new paths are accepted (set to false during shutdown)
    accepting_new: Arc<AtomicBool>,
    pub(crate) counters: Counters,
}

impl IngestionPipeline {
    /// Create a pipeline that talks to `remote` and quarantines into `config.watch.quarantine_dir`
    pub fn new(config: Arc<Config>, remote: Arc<dyn RemoteApi>) -> Self {
        let (event_tx, _rx) = broadcast::channel(config.pipeline.event_channel_capacity.max(1));
        let router = FailureRouter::new(config.watch.quarantine_dir.clone());

        tracing::debug!(
            remote = remote.name(),
            quarantine_dir = %router.quarantine_dir().display(),
            "ingestion pipeline created"
        );

        Self {
            config,
            remote,
            router,
            claims: ClaimSet::default(),
            event_tx,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            accepting_new: Arc::new(AtomicBool::new(true)),
            counters: Counters::default(),
        }
    }

    /// Subscribe to pipeline events
    ///
    /// Each subscriber receives every event independently. A subscriber that falls more than
    /// `pipeline.event_channel_capacity` events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Snapshot of activity since startup
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            quarantined: self.counters.quarantined.load(Ordering::Relaxed),
            quarantine_failed: self.counters.quarantine_failed.load(Ordering::Relaxed),
            vanished: self.counters.vanished.load(Ordering::Relaxed),
            duplicates_suppressed: self.counters.duplicates_suppressed.load(Ordering::Relaxed),
            in_flight: self.claims.len(),
        }
    }

    /// Whether new paths are still accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    /// Process one detected file to its terminal state
    ///
    /// Never fails: every step failure becomes a quarantine attempt and is reported through
    /// the returned [`Outcome`].
    pub async fn process(&self, path: PathBuf) -> Outcome {
        match self.admit(&path) {
            Ok(claim) => self.run_workflow(path, claim).await,
            Err(outcome) => outcome,
        }
    }

    /// Spawn [`process`](Self::process) as a tracked background task
    ///
    /// The path is claimed before the task is spawned, so two dispatches for the same path in
    /// quick succession yield exactly one workflow.
    pub fn dispatch(&self, path: PathBuf) -> JoinHandle<Outcome> {
        let admitted = self.admit(&path);
        let pipeline = self.clone();
        self.tasks.spawn(async move {
            match admitted {
                Ok(claim) => pipeline.run_workflow(path, claim).await,
                Err(outcome) => outcome,
            }
        })
    }

    /// Dispatch every path yielded by `source` until shutdown or until the source ends
    pub async fn run<S: FileEventSource>(&self, mut source: S) {
        tracing::info!("Watching for new files");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::debug!("shutdown requested, no longer consuming file events");
                    break;
                }
                next = source.next_created() => match next {
                    Some(path) => {
                        tracing::debug!(path = %path.display(), "file event received");
                        drop(self.dispatch(path));
                    }
                    None => {
                        tracing::info!("file event source closed");
                        break;
                    }
                },
            }
        }
    }

    /// Stop accepting paths and wait for in-flight workflows
    ///
    /// Workflows still in the stability wait end as [`Outcome::Deferred`] and leave their file
    /// untouched. Workflows past it run to completion, bounded by `pipeline.shutdown_timeout`.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
        self.tasks.close();
        tracing::info!(in_flight = self.claims.len(), "Stopped accepting new files");

        let timeout = self.config.pipeline.shutdown_timeout;
        match tokio::time::timeout(timeout, self.tasks.wait()).await {
            Ok(()) => tracing::info!("All in-flight workflows finished"),
            Err(_) => tracing::warn!(
                timeout_secs = timeout.as_secs(),
                in_flight = self.claims.len(),
                "Timeout waiting for workflows to finish, proceeding with shutdown"
            ),
        }

        self.emit(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
    }

    /// Claim `path`, or explain why it cannot be processed now
    fn admit(&self, path: &std::path::Path) -> Result<Claim, Outcome> {
        if !self.is_accepting() {
            tracing::debug!(path = %path.display(), "rejecting file, shutdown in progress");
            return Err(Outcome::Rejected);
        }

        match self.claims.try_claim(path) {
            Some(claim) => Ok(claim),
            None => {
                self.counters
                    .duplicates_suppressed
                    .fetch_add(1, Ordering::Relaxed);
                tracing::debug!(path = %path.display(), "file already being processed, ignoring event");
                Err(Outcome::AlreadyActive)
            }
        }
    }

    /// Emit an event to all subscribers
    ///
    /// With no subscribers the event is dropped.
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
