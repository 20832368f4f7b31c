//! Accept loop and per-connection frame reads.
//!
//! One frame per connection: read the 5-byte header, read exactly the
//! declared payload, dispatch to the sink, close. A connection that closes
//! before a full header arrives carried no frame and is dropped silently;
//! one that dies mid-payload is logged and abandoned without disturbing
//! any other transfer.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;

use stillgrid::{decode_header, HEADER_LEN};

use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::sink::FrameSink;

/// Central ingestion server for still-image frames.
pub struct IngestionServer {
    listener: TcpListener,
    sink: Arc<dyn FrameSink>,
    limits: ReadLimits,
}

impl IngestionServer {
    /// Bind the configured address. Failure here is fatal for the hub.
    pub async fn bind(config: &HubConfig, sink: Arc<dyn FrameSink>) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| HubError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        log::info!("Listening for frames on {}", config.bind_addr);

        Ok(Self {
            listener,
            sink,
            limits: ReadLimits::from_config(config),
        })
    }

    /// Address the listener actually bound. With port 0 this is the only
    /// way to learn the assigned port.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the shutdown signal.
    ///
    /// Each accepted connection runs in its own task. On shutdown the
    /// listener closes immediately but in-flight transfers are drained to
    /// completion, never aborted.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<()>) -> Result<()> {
        let mut handlers = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            log::debug!("Connection from {peer}");
                            let sink = self.sink.clone();
                            let limits = self.limits;
                            handlers.spawn(handle_connection(stream, peer, sink, limits));
                        }
                        Err(e) => {
                            // Transient accept failures (EMFILE and friends)
                            // must not take the listener down.
                            log::warn!("Accept failed: {e}");
                        }
                    }
                }
                // Reap finished handlers so the set does not grow unbounded.
                _ = handlers.join_next(), if !handlers.is_empty() => {}
                _ = shutdown_rx.changed() => {
                    log::info!("Closing frame listener");
                    break;
                }
            }
        }

        drop(self.listener);
        let in_flight = handlers.len();
        if in_flight > 0 {
            log::info!("Waiting for {in_flight} in-flight transfers");
        }
        while handlers.join_next().await.is_some() {}
        log::info!("Ingestion server stopped");
        Ok(())
    }
}

/// Per-connection read policy, copied out of the config at bind time.
#[derive(Debug, Clone, Copy)]
struct ReadLimits {
    max_payload: u32,
    timeout: Option<Duration>,
}

impl ReadLimits {
    fn from_config(config: &HubConfig) -> Self {
        Self {
            max_payload: config.max_payload_bytes,
            timeout: config.read_timeout(),
        }
    }
}

/// What a single connection produced.
#[derive(Debug)]
enum FrameRead {
    /// Full frame: origin node and payload, ready for dispatch.
    Complete { node_id: u8, payload: Vec<u8> },
    /// Closed before a complete header. Routine (probes, health checks),
    /// logged at debug only.
    Empty,
    /// A frame was promised but never completed, or the declaration was
    /// unacceptable. The connection is dropped where it stands.
    Abandoned { reason: String },
}

/// Drive one accepted connection through the one-frame protocol.
async fn handle_connection(
    mut stream: TcpStream,
    peer: std::net::SocketAddr,
    sink: Arc<dyn FrameSink>,
    limits: ReadLimits,
) {
    match read_frame(&mut stream, limits).await {
        FrameRead::Complete { node_id, payload } => {
            log::debug!(
                "Frame from node {node_id} via {peer}: {} bytes",
                payload.len()
            );
            sink.dispatch(node_id, payload).await;
        }
        FrameRead::Empty => {
            log::debug!("Connection from {peer} closed without a frame");
        }
        FrameRead::Abandoned { reason } => {
            log::warn!("Abandoned transfer from {peer}: {reason}");
        }
    }
}

/// Read one frame off the stream.
///
/// Senders write the whole frame as soon as they connect, so a connection
/// that closes before a full header carried no frame at all.
async fn read_frame<R>(stream: &mut R, limits: ReadLimits) -> FrameRead
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    if let Err(e) = read_exact_bounded(stream, &mut header, limits.timeout).await {
        return if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FrameRead::Empty
        } else {
            FrameRead::Abandoned {
                reason: format!("header read failed: {e}"),
            }
        };
    }

    let (node_id, payload_len) = decode_header(&header);
    if payload_len > limits.max_payload {
        return FrameRead::Abandoned {
            reason: format!(
                "node {node_id} declared a {payload_len} byte payload, limit is {}",
                limits.max_payload
            ),
        };
    }

    let mut payload = vec![0u8; payload_len as usize];
    if let Err(e) = read_exact_bounded(stream, &mut payload, limits.timeout).await {
        return FrameRead::Abandoned {
            reason: format!("partial {payload_len} byte frame from node {node_id}: {e}"),
        };
    }

    FrameRead::Complete { node_id, payload }
}

/// `read_exact` bounded by the configured stall timeout.
async fn read_exact_bounded<R>(
    stream: &mut R,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, stream.read_exact(buf)).await {
            Ok(res) => res.map(|_| ()),
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("no data for {}s", limit.as_secs()),
            )),
        },
        None => stream.read_exact(buf).await.map(|_| ()),
    }
}
