//! Download tracking.
//!
//! The embedded download subsystem signals new downloads and emits strictly
//! ordered progress ticks per download id; ticks across different downloads
//! interleave arbitrarily. The tracker mirrors each download as a record
//! that is persisted on every change so an unexpected shutdown leaves the
//! last known byte counts on disk.
//!
//! State machine: `progressing → {completed | cancelled | interrupted}`.
//! All three right-hand states are terminal — a late tick for a terminal
//! id is discarded, not an error.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::now_millis;

/// Lifecycle state of one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    Progressing,
    Completed,
    Cancelled,
    Interrupted,
}

impl DownloadState {
    pub fn is_terminal(self) -> bool {
        self != Self::Progressing
    }
}

/// One download, as surfaced to the UI and persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    pub id: String,
    pub filename: String,
    pub url: String,
    pub total_bytes: u64,
    pub received_bytes: u64,
    pub state: DownloadState,
    /// Unix milliseconds.
    pub start_time: i64,
    pub save_path: String,
}

/// Per-download state machines for the current session.
///
/// Persistence and UI fan-out are the coordinator's job; the tracker owns
/// only the transition rules. Every mutator returns the updated record for
/// the caller to persist and push, or `None` when the tick referenced an
/// unknown or already-terminal download and nothing changed.
#[derive(Default)]
pub struct DownloadTracker {
    live: Vec<Download>,
}

impl DownloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new download. The destination joins the configured
    /// download directory with the engine-suggested filename.
    pub fn begin(
        &mut self,
        filename: &str,
        url: &str,
        total_bytes: u64,
        download_dir: &Path,
    ) -> Download {
        let download = Download {
            id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            url: url.to_string(),
            total_bytes,
            received_bytes: 0,
            state: DownloadState::Progressing,
            start_time: now_millis(),
            save_path: download_dir.join(filename).to_string_lossy().into_owned(),
        };
        info!(id = %download.id, filename, total_bytes, "download started");
        self.live.push(download.clone());
        download
    }

    /// Applies a progress tick. Byte counts update only while progressing.
    pub fn progress(&mut self, id: &str, received_bytes: u64, total_bytes: u64) -> Option<Download> {
        let download = self.live_mut(id)?;
        download.received_bytes = received_bytes;
        download.total_bytes = total_bytes;
        Some(download.clone())
    }

    /// Terminal transition: completed. Received bytes are pinned to total.
    pub fn complete(&mut self, id: &str) -> Option<Download> {
        let download = self.live_mut(id)?;
        download.state = DownloadState::Completed;
        download.received_bytes = download.total_bytes;
        info!(id = %download.id, filename = %download.filename, "download completed");
        Some(download.clone())
    }

    /// Terminal transition: cancelled.
    pub fn cancel(&mut self, id: &str) -> Option<Download> {
        let download = self.live_mut(id)?;
        download.state = DownloadState::Cancelled;
        Some(download.clone())
    }

    /// Terminal transition: interrupted. The record keeps its last byte
    /// counts so the download is resumable from the persisted state.
    pub fn interrupt(&mut self, id: &str) -> Option<Download> {
        let download = self.live_mut(id)?;
        download.state = DownloadState::Interrupted;
        Some(download.clone())
    }

    pub fn get(&self, id: &str) -> Option<&Download> {
        self.live.iter().find(|d| d.id == id)
    }

    /// Finds the record if it exists and is still mutable.
    fn live_mut(&mut self, id: &str) -> Option<&mut Download> {
        match self.live.iter_mut().find(|d| d.id == id) {
            Some(download) if download.state.is_terminal() => {
                debug!(id, state = ?download.state, "tick for terminal download discarded");
                None
            }
            Some(download) => Some(download),
            None => {
                debug!(id, "tick for unknown download discarded");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begin(tracker: &mut DownloadTracker) -> String {
        tracker
            .begin("file.zip", "https://example.com/file.zip", 100, Path::new("/tmp"))
            .id
    }

    #[test]
    fn test_begin_resolves_save_path() {
        let mut tracker = DownloadTracker::new();
        let download =
            tracker.begin("file.zip", "https://example.com/file.zip", 100, Path::new("/dl"));
        assert_eq!(download.save_path, "/dl/file.zip");
        assert_eq!(download.state, DownloadState::Progressing);
        assert_eq!(download.received_bytes, 0);
    }

    #[test]
    fn test_progress_updates_counts() {
        let mut tracker = DownloadTracker::new();
        let id = begin(&mut tracker);

        let updated = tracker.progress(&id, 40, 100).unwrap();
        assert_eq!(updated.received_bytes, 40);

        // The subsystem may revise the total mid-flight.
        let updated = tracker.progress(&id, 60, 120).unwrap();
        assert_eq!(updated.total_bytes, 120);
    }

    #[test]
    fn test_complete_pins_received_to_total() {
        let mut tracker = DownloadTracker::new();
        let id = begin(&mut tracker);
        tracker.progress(&id, 40, 100);

        let done = tracker.complete(&id).unwrap();
        assert_eq!(done.state, DownloadState::Completed);
        assert_eq!(done.received_bytes, 100);
    }

    #[test]
    fn test_completed_rejects_later_ticks() {
        let mut tracker = DownloadTracker::new();
        let id = begin(&mut tracker);
        tracker.complete(&id);

        assert!(tracker.progress(&id, 10, 100).is_none());
        assert!(tracker.cancel(&id).is_none());
        // Bytes stay pinned at total.
        assert_eq!(tracker.get(&id).unwrap().received_bytes, 100);
        assert_eq!(tracker.get(&id).unwrap().state, DownloadState::Completed);
    }

    #[test]
    fn test_cancelled_ignores_later_ticks() {
        let mut tracker = DownloadTracker::new();
        let id = begin(&mut tracker);
        tracker.progress(&id, 30, 100);
        tracker.cancel(&id);

        assert!(tracker.progress(&id, 90, 100).is_none());
        assert_eq!(tracker.get(&id).unwrap().received_bytes, 30);
        assert_eq!(tracker.get(&id).unwrap().state, DownloadState::Cancelled);
    }

    #[test]
    fn test_interrupted_keeps_byte_counts() {
        let mut tracker = DownloadTracker::new();
        let id = begin(&mut tracker);
        tracker.progress(&id, 70, 100);

        let interrupted = tracker.interrupt(&id).unwrap();
        assert_eq!(interrupted.state, DownloadState::Interrupted);
        assert_eq!(interrupted.received_bytes, 70);
    }

    #[test]
    fn test_unknown_id_is_discarded() {
        let mut tracker = DownloadTracker::new();
        assert!(tracker.progress("missing", 1, 2).is_none());
        assert!(tracker.complete("missing").is_none());
    }

    #[test]
    fn test_independent_downloads_interleave() {
        let mut tracker = DownloadTracker::new();
        let first = begin(&mut tracker);
        let second = begin(&mut tracker);

        tracker.progress(&first, 10, 100);
        tracker.progress(&second, 90, 100);
        tracker.complete(&second);
        tracker.progress(&first, 20, 100);

        assert_eq!(tracker.get(&first).unwrap().received_bytes, 20);
        assert_eq!(tracker.get(&second).unwrap().state, DownloadState::Completed);
    }
}
