//! Integration tests for the hub's one-frame-per-connection ingestion path.
//!
//! Each test binds its own listener on an ephemeral loopback port and wires
//! a channel sink, so the tests run in parallel and need no external
//! services.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use stillgrid::Frame;
use stillgrid_hub::config::HubConfig;
use stillgrid_hub::error::Result;
use stillgrid_hub::server::IngestionServer;
use stillgrid_hub::sink::ChannelSink;

/// A running hub bound to an ephemeral port, dispatching into a channel.
struct HubFixture {
    addr: std::net::SocketAddr,
    frames: mpsc::Receiver<(u8, Vec<u8>)>,
    shutdown: watch::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl HubFixture {
    async fn start() -> Self {
        Self::start_with(HubConfig {
            bind_addr: "127.0.0.1:0".into(),
            max_payload_bytes: 1024 * 1024,
            read_timeout_secs: 1,
        })
        .await
    }

    async fn start_with(config: HubConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let (tx, frames) = mpsc::channel(64);
        let server = IngestionServer::bind(&config, Arc::new(ChannelSink::new(tx)))
            .await
            .expect("bind failed");
        let addr = server.local_addr().expect("local addr");

        let (shutdown, shutdown_rx) = watch::channel(());
        let task = tokio::spawn(server.run(shutdown_rx));

        Self {
            addr,
            frames,
            shutdown,
            task,
        }
    }

    /// Next dispatched frame, failing the test after two seconds.
    async fn next_frame(&mut self) -> (u8, Vec<u8>) {
        tokio::time::timeout(Duration::from_secs(2), self.frames.recv())
            .await
            .expect("timed out waiting for a dispatched frame")
            .expect("sink channel closed")
    }

    /// Assert nothing reaches the sink within a settling window.
    async fn expect_no_frame(&mut self) {
        let outcome = tokio::time::timeout(Duration::from_millis(300), self.frames.recv()).await;
        assert!(outcome.is_err(), "unexpected dispatch: {outcome:?}");
    }

    async fn stop(self) {
        self.shutdown.send(()).expect("server already gone");
        self.task
            .await
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

#[tokio::test]
async fn test_one_frame_is_dispatched_exactly_once() {
    let mut hub = HubFixture::start().await;

    let mut conn = TcpStream::connect(hub.addr).await.unwrap();
    conn.write_all(&[0x03, 0x00, 0x00, 0x00, 0x04]).await.unwrap();
    conn.write_all(&[0xDE, 0xAD, 0xBE, 0xEF]).await.unwrap();
    conn.shutdown().await.unwrap();

    assert_eq!(hub.next_frame().await, (3, vec![0xDE, 0xAD, 0xBE, 0xEF]));
    hub.expect_no_frame().await;

    hub.stop().await;
}

#[tokio::test]
async fn test_drip_fed_frame_is_reassembled() {
    let mut hub = HubFixture::start().await;

    let bytes = Frame::new(8, vec![10, 20, 30]).encode();
    let mut conn = TcpStream::connect(hub.addr).await.unwrap();
    for byte in bytes {
        conn.write_all(&[byte]).await.unwrap();
        conn.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    drop(conn);

    assert_eq!(hub.next_frame().await, (8, vec![10, 20, 30]));
    hub.stop().await;
}

#[tokio::test]
async fn test_empty_connection_dispatches_nothing() {
    let mut hub = HubFixture::start().await;

    let conn = TcpStream::connect(hub.addr).await.unwrap();
    drop(conn);

    hub.expect_no_frame().await;
    hub.stop().await;
}

#[tokio::test]
async fn test_short_header_dispatches_nothing() {
    let mut hub = HubFixture::start().await;

    let mut probe = TcpStream::connect(hub.addr).await.unwrap();
    probe.write_all(&[0x01, 0x00, 0x00]).await.unwrap();
    drop(probe);
    hub.expect_no_frame().await;

    // The next sender is unaffected.
    let mut conn = TcpStream::connect(hub.addr).await.unwrap();
    conn.write_all(&Frame::new(7, vec![9, 9]).encode())
        .await
        .unwrap();
    drop(conn);
    assert_eq!(hub.next_frame().await, (7, vec![9, 9]));

    hub.stop().await;
}

#[tokio::test]
async fn test_truncated_payload_dispatches_nothing() {
    let mut hub = HubFixture::start().await;

    // Ten bytes promised, four delivered.
    let mut conn = TcpStream::connect(hub.addr).await.unwrap();
    conn.write_all(&[0x05, 0x00, 0x00, 0x00, 0x0A, 1, 2, 3, 4])
        .await
        .unwrap();
    drop(conn);
    hub.expect_no_frame().await;

    // Later transfers still land.
    let mut conn = TcpStream::connect(hub.addr).await.unwrap();
    conn.write_all(&Frame::new(5, vec![1, 2, 3]).encode())
        .await
        .unwrap();
    drop(conn);
    assert_eq!(hub.next_frame().await, (5, vec![1, 2, 3]));

    hub.stop().await;
}

#[tokio::test]
async fn test_zero_length_frame_is_dispatched() {
    let mut hub = HubFixture::start().await;

    let mut conn = TcpStream::connect(hub.addr).await.unwrap();
    conn.write_all(&[0x09, 0x00, 0x00, 0x00, 0x00]).await.unwrap();
    drop(conn);

    assert_eq!(hub.next_frame().await, (9, Vec::new()));
    hub.stop().await;
}

#[tokio::test]
async fn test_concurrent_senders_with_distinct_ids() {
    let mut hub = HubFixture::start().await;

    // Both connections are open before either payload is written, so the
    // transfers genuinely overlap.
    let mut first = TcpStream::connect(hub.addr).await.unwrap();
    let mut second = TcpStream::connect(hub.addr).await.unwrap();

    first.write_all(&[0x01, 0x00, 0x00, 0x00, 0x03]).await.unwrap();
    second.write_all(&[0x02, 0x00, 0x00, 0x00, 0x03]).await.unwrap();

    // Payloads land in the opposite order of the headers.
    second.write_all(&[0xB0, 0xB1, 0xB2]).await.unwrap();
    first.write_all(&[0xA0, 0xA1, 0xA2]).await.unwrap();
    drop(first);
    drop(second);

    let mut frames = vec![hub.next_frame().await, hub.next_frame().await];
    frames.sort_by_key(|(node_id, _)| *node_id);
    assert_eq!(
        frames,
        vec![(1, vec![0xA0, 0xA1, 0xA2]), (2, vec![0xB0, 0xB1, 0xB2])]
    );

    hub.stop().await;
}

#[tokio::test]
async fn test_oversize_declaration_dispatches_nothing() {
    let mut hub = HubFixture::start_with(HubConfig {
        bind_addr: "127.0.0.1:0".into(),
        max_payload_bytes: 8,
        read_timeout_secs: 1,
    })
    .await;

    let mut conn = TcpStream::connect(hub.addr).await.unwrap();
    // One megabyte declared against an eight byte limit.
    conn.write_all(&[0x04, 0x00, 0x10, 0x00, 0x00]).await.unwrap();
    drop(conn);
    hub.expect_no_frame().await;

    // A frame inside the limit still lands.
    let mut conn = TcpStream::connect(hub.addr).await.unwrap();
    conn.write_all(&Frame::new(4, vec![1]).encode()).await.unwrap();
    drop(conn);
    assert_eq!(hub.next_frame().await, (4, vec![1]));

    hub.stop().await;
}

#[tokio::test]
async fn test_repeated_cycles_from_one_node() {
    let mut hub = HubFixture::start().await;

    for i in 0..5u8 {
        let mut conn = TcpStream::connect(hub.addr).await.unwrap();
        conn.write_all(&Frame::new(3, vec![i]).encode()).await.unwrap();
        drop(conn);
        assert_eq!(hub.next_frame().await, (3, vec![i]));
    }

    hub.stop().await;
}

#[tokio::test]
async fn test_shutdown_unblocks_the_accept_loop() {
    let hub = HubFixture::start().await;
    // No connections at all; stop must still return promptly.
    tokio::time::timeout(Duration::from_secs(2), hub.stop())
        .await
        .expect("shutdown did not unblock the accept loop");
}
