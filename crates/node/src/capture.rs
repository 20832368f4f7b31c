//! File-backed capture source.
//!
//! The camera pipelines on the edge boxes drop their newest snapshot at a
//! fixed path. This watcher polls the file's modification time and publishes
//! the bytes into the frame store whenever it changes, keeping the sender
//! decoupled from whatever produces the images.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::sync::watch;

use crate::config::CaptureConfig;
use crate::error::Result;
use crate::store::FrameStore;

/// Polls a snapshot file and publishes new contents into the store.
pub struct FileCapture {
    path: PathBuf,
    poll: Duration,
    store: FrameStore,
    last_modified: Option<SystemTime>,
    reported_missing: bool,
}

impl FileCapture {
    pub fn new(config: &CaptureConfig, store: FrameStore) -> Self {
        Self {
            path: config.path.clone(),
            poll: Duration::from_millis(config.poll_ms),
            store,
            last_modified: None,
            reported_missing: false,
        }
    }

    /// Watch the snapshot file until shutdown.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<()>) -> Result<()> {
        log::info!(
            "Watching {} for snapshots every {}ms",
            self.path.display(),
            self.poll.as_millis()
        );

        let mut ticker = tokio::time::interval(self.poll);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => break,

                _ = ticker.tick() => self.poll_once().await,
            }
        }
        Ok(())
    }

    /// Publish the file into the store if it changed since the last poll.
    async fn poll_once(&mut self) {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(_) => {
                // The camera pipeline may not have produced anything yet.
                if !self.reported_missing {
                    log::warn!("Snapshot file {} not found yet", self.path.display());
                    self.reported_missing = true;
                }
                return;
            }
        };
        self.reported_missing = false;

        let modified = meta.modified().ok();
        if modified.is_some() && modified == self.last_modified {
            return;
        }

        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => {
                // Mid-overwrite; pick it up on the next poll.
            }
            Ok(bytes) => {
                log::debug!(
                    "New {} byte snapshot from {}",
                    bytes.len(),
                    self.path.display()
                );
                self.store.publish(bytes).await;
                self.last_modified = modified;
            }
            Err(e) => log::warn!("Failed to read {}: {e}", self.path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_capture(dir: &TempDir) -> (FileCapture, FrameStore, PathBuf) {
        let path = dir.path().join("latest.jpg");
        let store = FrameStore::new();
        let config = CaptureConfig {
            path: path.clone(),
            poll_ms: 10,
        };
        (FileCapture::new(&config, store.clone()), store, path)
    }

    #[tokio::test]
    async fn test_missing_file_publishes_nothing() {
        let dir = TempDir::new().unwrap();
        let (mut capture, store, _path) = test_capture(&dir);

        capture.poll_once().await;
        assert_eq!(store.latest().await, None);
    }

    #[tokio::test]
    async fn test_new_snapshot_is_published() {
        let dir = TempDir::new().unwrap();
        let (mut capture, store, path) = test_capture(&dir);

        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();
        capture.poll_once().await;

        assert_eq!(store.latest().await, Some(vec![0xFF, 0xD8, 0xFF]));
    }

    #[tokio::test]
    async fn test_unchanged_file_is_not_republished() {
        let dir = TempDir::new().unwrap();
        let (mut capture, store, path) = test_capture(&dir);

        std::fs::write(&path, [1, 2, 3]).unwrap();
        capture.poll_once().await;

        // Clobber the slot; an unchanged file must not overwrite it again.
        store.publish(vec![9]).await;
        capture.poll_once().await;

        assert_eq!(store.latest().await, Some(vec![9]));
    }

    #[tokio::test]
    async fn test_rewritten_file_is_republished() {
        let dir = TempDir::new().unwrap();
        let (mut capture, store, path) = test_capture(&dir);

        std::fs::write(&path, [1]).unwrap();
        capture.poll_once().await;
        assert_eq!(store.latest().await, Some(vec![1]));

        // Give the filesystem clock room to move.
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(&path, [2]).unwrap();
        capture.poll_once().await;

        assert_eq!(store.latest().await, Some(vec![2]));
    }

    #[tokio::test]
    async fn test_empty_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let (mut capture, store, path) = test_capture(&dir);

        std::fs::write(&path, []).unwrap();
        capture.poll_once().await;

        assert_eq!(store.latest().await, None);
    }
}
