//! Deltawatch hot reload.
//!
//! Pushes compiled code deltas into a running target process, or into a
//! browser-hosted target, without restarting it.

pub use deltawatch_core as core;
pub use deltawatch_daemon as daemon;

/// Version of deltawatch
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
