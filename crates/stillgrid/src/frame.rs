//! Wire framing for still-image transfers.
//!
//! Every transfer is one frame: a fixed 5-byte header followed by the image
//! payload. The header carries the origin node and the exact payload size so
//! the receiver knows how much to read before the connection closes.
//!
//! ```text
//! ┌──────────────┬──────────────────────┬───────────────────┐
//! │ node_id: u8  │ payload_len: u32 BE  │ payload bytes ... │
//! └──────────────┴──────────────────────┴───────────────────┘
//! ```
//!
//! There is no magic number, checksum or version field; existing senders on
//! the wire use exactly this layout.

/// Size in bytes of the fixed frame header.
pub const HEADER_LEN: usize = 5;

/// A single still-image transfer: origin node plus encoded image bytes.
///
/// Frames are built fresh each send cycle and consumed on dispatch; nothing
/// retains them afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Statically assigned origin node, 1-255. Zero is never assigned.
    pub node_id: u8,
    /// Encoded image bytes. May be empty; a zero-length payload is a valid
    /// frame end to end.
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(node_id: u8, payload: Vec<u8>) -> Self {
        Self { node_id, payload }
    }

    /// Serialize header and payload into one buffer ready for the socket.
    ///
    /// The payload length must fit in a `u32`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&encode_header(self.node_id, self.payload.len() as u32));
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// Build the 5-byte header for a payload of `payload_len` bytes from `node_id`.
pub fn encode_header(node_id: u8, payload_len: u32) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0] = node_id;
    header[1..].copy_from_slice(&payload_len.to_be_bytes());
    header
}

/// Split a received header into `(node_id, payload_len)`.
///
/// Total over all inputs: any 5 bytes decode to some pair. Garbage on the
/// wire surfaces later, as a payload read that cannot be satisfied.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> (u8, u32) {
    let mut len = [0u8; 4];
    len.copy_from_slice(&header[1..]);
    (header[0], u32::from_be_bytes(len))
}
