//! Stillgrid ingestion hub.
//!
//! Accepts TCP connections from capture nodes, reads exactly one framed
//! still image per connection, and hands it to a dispatch sink. Connections
//! are independent: a slow, malformed or abandoned transfer never delays
//! the others.
//!
//! # Ingestion path
//!
//! ```text
//! node 1 ──connect──► ┌─────────────┐  spawn per  ┌─────────┐
//! node 2 ──connect──► │ accept loop │ ──────────► │ handler │ ──► FrameSink
//! node N ──connect──► └─────────────┘  connection └─────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`] — YAML-based hub configuration.
//! - [`error`] — unified error type for hub operations.
//! - [`server`] — accept loop and per-connection frame reads.
//! - [`sink`] — dispatch sink trait plus the log and channel built-ins.

pub mod config;
pub mod error;
pub mod server;
pub mod sink;
