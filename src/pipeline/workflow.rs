//! The per-file state machine.

use super::IngestionPipeline;
use super::claims::Claim;
use super::router::QuarantineOutcome;
use super::stability::wait_for_stability;
use crate::error::{Error, FailureClass, RemoteOperation, Result};
use crate::remote::RemoteResult;
use crate::types::{Event, FileState, NewPost, Outcome, VideoFile};
use std::path::PathBuf;
use std::sync::atomic::Ordering;

/// Where the happy path stopped
enum Progress {
    /// Post created; the file can be deleted
    Posted { title: String },
    /// Shutdown arrived before the file was touched
    Deferred,
}

impl IngestionPipeline {
    /// Drive one claimed file to its terminal state
    ///
    /// The claim is held until the file has been deleted or quarantined.
    pub(crate) async fn run_workflow(&self, path: PathBuf, claim: Claim) -> Outcome {
        let _claim = claim;
        tracing::info!(path = %path.display(), "New file detected");
        self.emit(Event::FileDetected { path: path.clone() });

        let mut file = VideoFile::detected(path);
        match self.run_steps(&mut file).await {
            Ok(Progress::Posted { title }) => self.complete(&file, title).await,
            Ok(Progress::Deferred) => Outcome::Deferred,
            Err(e) => self.fail(&mut file, e).await,
        }
    }

    async fn run_steps(&self, file: &mut VideoFile) -> Result<Progress> {
        self.advance(file, FileState::AwaitingStability)?;
        let size = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                tracing::info!(
                    path = %file.path().display(),
                    "shutdown during stability wait, leaving file for the next run"
                );
                return Ok(Progress::Deferred);
            }
            settled = wait_for_stability(file.path(), &self.config.stability) => settled?,
        };
        tracing::debug!(path = %file.path().display(), bytes = size, "file ready");
        self.advance(file, FileState::Ready)?;

        self.advance(file, FileState::RequestingTarget)?;
        let target = self.observe(
            file,
            RemoteOperation::RequestUploadTarget,
            self.remote.request_upload_target().await,
            |_| None,
        )?;

        self.advance(file, FileState::Uploading)?;
        self.observe(
            file,
            RemoteOperation::Upload,
            self.remote.upload(&target, file.path()).await,
            |status| Some(*status),
        )?;

        self.advance(file, FileState::CreatingPost)?;
        let post = NewPost::private(file.file_name(), target.hash, self.config.api.category_id);
        self.observe(
            file,
            RemoteOperation::CreatePost,
            self.remote.create_post(&post).await,
            |status| Some(*status),
        )?;

        self.advance(file, FileState::Completed)?;
        Ok(Progress::Posted { title: post.title })
    }

    /// Delete a posted file; a failed delete is logged and does not change the outcome
    async fn complete(&self, file: &VideoFile, title: String) -> Outcome {
        match tokio::fs::remove_file(file.path()).await {
            Ok(()) => {
                tracing::info!(path = %file.path().display(), "Deleted local file");
            }
            Err(e) => {
                tracing::warn!(
                    path = %file.path().display(),
                    class = ?FailureClass::TransientIo,
                    error = %e,
                    "Failed to delete file after posting"
                );
            }
        }

        self.counters.completed.fetch_add(1, Ordering::Relaxed);
        self.emit(Event::Completed {
            path: file.path().to_path_buf(),
            title,
        });
        Outcome::Completed
    }

    /// Route a file whose step failed into quarantine
    async fn fail(&self, file: &mut VideoFile, error: Error) -> Outcome {
        tracing::error!(
            path = %file.path().display(),
            state = %file.state(),
            class = ?error.class(),
            error = %error,
            "Processing failed"
        );
        if let Err(e) = self.advance(file, FileState::Failed) {
            tracing::warn!(error = %e, "could not record failure state");
        }

        let path = file.path().to_path_buf();
        let reason = error.to_string();
        match self.router.quarantine(&path).await {
            Ok(outcome) => {
                let destination = match outcome {
                    QuarantineOutcome::Moved(dest) => {
                        self.counters.quarantined.fetch_add(1, Ordering::Relaxed);
                        Some(dest)
                    }
                    QuarantineOutcome::AlreadyAbsent => {
                        self.counters.vanished.fetch_add(1, Ordering::Relaxed);
                        None
                    }
                };
                self.emit(Event::Quarantined {
                    path,
                    destination: destination.clone(),
                    reason,
                });
                Outcome::Quarantined { destination }
            }
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    class = ?e.class(),
                    error = %e,
                    "Failed to quarantine file, leaving it in place"
                );
                self.counters
                    .quarantine_failed
                    .fetch_add(1, Ordering::Relaxed);
                let error = e.to_string();
                self.emit(Event::QuarantineFailed {
                    path,
                    error: error.clone(),
                });
                Outcome::QuarantineFailed { error }
            }
        }
    }

    fn advance(&self, file: &mut VideoFile, to: FileState) -> Result<()> {
        let from = file.advance(to)?;
        tracing::info!(
            path = %file.path().display(),
            from = %from,
            to = %to,
            "state transition"
        );
        self.emit(Event::StateChanged {
            path: file.path().to_path_buf(),
            from,
            to,
        });
        Ok(())
    }

    /// Publish the outcome of a remote call and convert its error
    fn observe<T>(
        &self,
        file: &VideoFile,
        operation: RemoteOperation,
        result: RemoteResult<T>,
        status_of: impl FnOnce(&T) -> Option<u16>,
    ) -> Result<T> {
        let (status, success) = match &result {
            Ok(value) => (status_of(value), true),
            Err(e) => (e.status(), false),
        };
        self.emit(Event::RemoteCall {
            path: file.path().to_path_buf(),
            operation: operation.to_string(),
            status,
            success,
        });
        if success {
            tracing::debug!(path = %file.path().display(), %operation, ?status, "remote call succeeded");
        }
        result.map_err(Error::from)
    }
}
