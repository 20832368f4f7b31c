//! Shared schemas for the stillgrid capture network.
//!
//! Stillgrid distributes periodic still captures from edge nodes to a central
//! hub over plain TCP, and lets an operator start or stop the capture process
//! on each node through an MQTT command channel.
//!
//! # Architecture
//!
//! ```text
//! capture node ──frame──► TCP :65432 ──► hub ──► dispatch sink
//!     ▲
//!     │ spawn/term
//! launcher ◄── {"command": ...} ── operator (stillgrid-ctl)
//!     │
//!     └── retained presence + last will ──► status topic
//! ```
//!
//! # Modules
//!
//! - [`frame`] — 5-byte header wire framing for image transfers.
//! - [`message`] — command and presence JSON schemas plus the topic layout.

pub mod frame;
pub mod message;

// Re-export commonly used types
pub use frame::{decode_header, encode_header, Frame, HEADER_LEN};
pub use message::{Command, CommandMessage, PresenceRecord, PresenceStatus};
