//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve servers → Build manager → Initial probe → Start scheduler
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown broadcast
//!
//! Shutdown (shutdown.rs):
//!     Stop scheduler → Cancel + drain streams → Drop pool → Persist registry
//! ```
//!
//! # Design Decisions
//! - Ordered startup: servers first, then manager, then background tasks
//! - Ordered shutdown mirrors startup in reverse
//! - Shutdown has a deadline; remaining work is abandoned after it

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{graceful_shutdown, Shutdown};
pub use startup::{bootstrap, default_servers, Runtime, ServerSource, StartupError};
