//! Event-driven waits for integration tests

use flic_ingest::Event;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;

/// Terminal disposition observed for a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Posted and deleted
    Completed(PathBuf),
    /// Moved to quarantine (or already gone)
    Quarantined(PathBuf),
    /// Could not be moved
    QuarantineFailed(PathBuf),
}

/// Collect `count` terminal dispositions, or panic after `timeout`
pub async fn wait_for_dispositions(
    events: &mut broadcast::Receiver<Event>,
    count: usize,
    timeout: Duration,
) -> Vec<Disposition> {
    let collect = async {
        let mut seen = Vec::new();
        while seen.len() < count {
            match events.recv().await {
                Ok(Event::Completed { path, .. }) => seen.push(Disposition::Completed(path)),
                Ok(Event::Quarantined { path, .. }) => seen.push(Disposition::Quarantined(path)),
                Ok(Event::QuarantineFailed { path, .. }) => {
                    seen.push(Disposition::QuarantineFailed(path))
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        seen
    };

    tokio::time::timeout(timeout, collect)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {} disposition(s)", count))
}

/// Names of the regular files in `dir`, sorted (empty if the directory is missing)
pub fn file_names(dir: &std::path::Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
