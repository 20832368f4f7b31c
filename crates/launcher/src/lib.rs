//! Stillgrid launcher.
//!
//! Runs on each edge box and owns the capture process there. Operators send
//! `{"command": "start"}` / `{"command": "stop"}` over MQTT; the launcher
//! applies them to its single child and keeps a retained presence record on
//! the shared status topic, with the `offline` record pre-armed as a last
//! will so crashes are visible without polling.
//!
//! # Command path
//!
//! ```text
//! operator ──{"command": ...}──► broker ──► Supervisor ──spawn/term──► capture process
//!                                  ▲
//!                                  └── retained online/offline + last will
//! ```
//!
//! # Modules
//!
//! - [`config`] — YAML-based launcher configuration.
//! - [`error`] — unified error type for launcher operations.
//! - [`process`] — the supervised capture process (spawn, probe, stop).
//! - [`supervisor`] — MQTT command loop and presence publishing.

pub mod config;
pub mod error;
pub mod process;
pub mod supervisor;
