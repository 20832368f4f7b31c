//! Latest-frame slot shared between the capture source and the sender.

use std::sync::Arc;
use tokio::sync::RwLock;

/// Holds the most recently captured encoded image.
///
/// One writer (the capture source), any number of readers. Images are
/// replaced whole, so a reader always observes a complete image, either the
/// previous one or the newest. Frames that are superseded before a send
/// cycle picks them up are simply gone; only the newest matters.
#[derive(Clone, Default)]
pub struct FrameStore {
    slot: Arc<RwLock<Option<Vec<u8>>>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored image.
    pub async fn publish(&self, image: Vec<u8>) {
        *self.slot.write().await = Some(image);
    }

    /// The most recent image, or `None` when nothing has been captured yet.
    pub async fn latest(&self) -> Option<Vec<u8>> {
        self.slot.read().await.clone()
    }
}
