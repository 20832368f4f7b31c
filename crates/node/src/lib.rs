//! Stillgrid capture node.
//!
//! Keeps the most recent still image from the local capture pipeline and
//! pushes it to the central hub on a fixed cadence, one fresh connection per
//! cycle. Delivery is best effort: a failed cycle is only logged, because
//! the next cycle carries a newer image anyway.
//!
//! # Send path
//!
//! ```text
//! capture source ──publish──► FrameStore ──latest──► PeriodicSender ──TCP──► hub
//! ```
//!
//! # Modules
//!
//! - [`capture`] — file-backed capture source polling for new snapshots.
//! - [`config`] — YAML-based node configuration.
//! - [`error`] — unified error type for node operations.
//! - [`sender`] — the periodic send loop.
//! - [`store`] — latest-frame slot shared with the capture source.

pub mod capture;
pub mod config;
pub mod error;
pub mod sender;
pub mod store;
