//! Dispatch sinks: where accepted frames go.
//!
//! The hub itself neither persists nor renders images; the sink decides.
//! [`LogSink`] reports receipt for headless deployments, [`ChannelSink`]
//! forwards frames to an embedding application over an mpsc channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Receives each fully read frame exactly once.
///
/// Connection handlers run concurrently, so implementations must tolerate
/// concurrent dispatch.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn dispatch(&self, node_id: u8, payload: Vec<u8>);
}

/// Reports each received frame to the log and drops the bytes.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl FrameSink for LogSink {
    async fn dispatch(&self, node_id: u8, payload: Vec<u8>) {
        log::info!("Received {} byte frame from node {node_id}", payload.len());
    }
}

/// Forwards each frame as `(node_id, payload)` into an mpsc channel.
pub struct ChannelSink {
    tx: mpsc::Sender<(u8, Vec<u8>)>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<(u8, Vec<u8>)>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn dispatch(&self, node_id: u8, payload: Vec<u8>) {
        if self.tx.send((node_id, payload)).await.is_err() {
            log::warn!("Dropped frame from node {node_id}: consumer channel closed");
        }
    }
}
