//! The periodic send loop.
//!
//! Every cycle: take the newest captured image, open a fresh hub
//! connection, write one frame, close. The hub never answers. When the
//! store is still empty the cycle is skipped without connecting at all.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use stillgrid::Frame;

use crate::config::NodeConfig;
use crate::error::Result;
use crate::store::FrameStore;

/// Pushes the latest captured image to the hub on a fixed cadence.
pub struct PeriodicSender {
    node_id: u8,
    hub_addr: String,
    period: Duration,
    connect_timeout: Duration,
    store: FrameStore,
    sent: u64,
    skipped: u64,
}

impl PeriodicSender {
    pub fn new(config: &NodeConfig, store: FrameStore) -> Self {
        Self {
            node_id: config.node_id,
            hub_addr: config.hub_addr.clone(),
            period: config.period(),
            connect_timeout: config.connect_timeout(),
            store,
            sent: 0,
            skipped: 0,
        }
    }

    /// Run send cycles until shutdown.
    ///
    /// A failed cycle is logged and swallowed; only the shutdown signal
    /// ends the loop.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<()>) -> Result<()> {
        log::info!(
            "Node {} sending to {} every {}s",
            self.node_id,
            self.hub_addr,
            self.period.as_secs()
        );

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // Consume the immediate tick; first send is one period in

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => break,

                _ = ticker.tick() => {
                    self.send_cycle().await;
                }
            }
        }

        log::info!(
            "Node {} sender stopped ({} sent, {} skipped)",
            self.node_id,
            self.sent,
            self.skipped
        );
        Ok(())
    }

    /// One cycle: connect, write the newest frame, close.
    async fn send_cycle(&mut self) {
        let Some(payload) = self.store.latest().await else {
            self.skipped += 1;
            log::debug!("No image captured yet, skipping cycle");
            return;
        };

        let frame = Frame::new(self.node_id, payload);
        match self.push_frame(&frame).await {
            Ok(()) => {
                self.sent += 1;
                log::info!(
                    "Sent {} byte frame to {} ({} total)",
                    frame.payload.len(),
                    self.hub_addr,
                    self.sent
                );
            }
            Err(e) => {
                // The next cycle carries a newer image; nothing to retry.
                log::warn!("Send to {} failed: {e}", self.hub_addr);
            }
        }
    }

    /// Open a fresh connection and write one frame.
    async fn push_frame(&self, frame: &Frame) -> std::io::Result<()> {
        let connect = TcpStream::connect(&self.hub_addr);
        let mut stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(res) => res?,
            Err(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect timed out after {}s", self.connect_timeout.as_secs()),
                ));
            }
        };

        stream.write_all(&frame.encode()).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn test_config(hub_addr: String) -> NodeConfig {
        let yaml = format!(
            "node_id: 3\nhub_addr: \"{hub_addr}\"\nperiod_secs: 1\nconnect_timeout_secs: 1\ncapture:\n  path: \"/tmp/unused.jpg\"\n"
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    async fn recv_connection(listener: &TcpListener) -> Vec<u8> {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_empty_store_skips_without_connecting() {
        // No listener exists; a connection attempt would fail loudly.
        let mut sender = PeriodicSender::new(
            &test_config("127.0.0.1:1".into()),
            FrameStore::new(),
        );

        sender.send_cycle().await;

        assert_eq!(sender.sent, 0);
        assert_eq!(sender.skipped, 1);
    }

    #[tokio::test]
    async fn test_cycle_writes_one_framed_image() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let store = FrameStore::new();
        store.publish(vec![0xDE, 0xAD, 0xBE, 0xEF]).await;
        let mut sender = PeriodicSender::new(&test_config(addr.to_string()), store);

        sender.send_cycle().await;

        let bytes = recv_connection(&listener).await;
        assert_eq!(
            bytes,
            vec![0x03, 0x00, 0x00, 0x00, 0x04, 0xDE, 0xAD, 0xBE, 0xEF]
        );
        assert_eq!(sender.sent, 1);
    }

    #[tokio::test]
    async fn test_each_cycle_sends_the_newest_image() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let store = FrameStore::new();
        let mut sender = PeriodicSender::new(&test_config(addr.to_string()), store.clone());

        store.publish(vec![1]).await;
        sender.send_cycle().await;
        assert_eq!(recv_connection(&listener).await[5..], [1]);

        store.publish(vec![2]).await;
        store.publish(vec![3]).await;
        sender.send_cycle().await;
        assert_eq!(recv_connection(&listener).await[5..], [3]);
    }

    #[tokio::test]
    async fn test_refused_connection_is_survived() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = FrameStore::new();
        store.publish(vec![42]).await;
        let mut sender = PeriodicSender::new(&test_config(addr.to_string()), store);

        // Must not panic or abort; the failure is logged and swallowed.
        sender.send_cycle().await;
        assert_eq!(sender.sent, 0);

        // A listener coming back up makes the next cycle succeed.
        let listener = TcpListener::bind(addr).await.unwrap();
        sender.send_cycle().await;
        let bytes = recv_connection(&listener).await;
        assert_eq!(bytes[0], 3);
        assert_eq!(sender.sent, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let sender = PeriodicSender::new(&test_config(addr.to_string()), FrameStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let task = tokio::spawn(sender.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        task.await.unwrap().unwrap();
    }
}
