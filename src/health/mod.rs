//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! scheduler.rs:
//!     Periodic timer
//!     → fan out probe.rs over every active server
//!     → each ServerStatus written to the registry as it completes
//!
//! On demand (bootstrap, admin API):
//!     probe_all / probe_server → same write-back path
//! ```
//!
//! # Design Decisions
//! - A probe never fails; every outcome becomes a status
//! - One slow server cannot delay the others (independent timeouts)
//! - The loop is an owned, cancellable task, not module state

pub mod probe;
pub mod scheduler;

pub use probe::HealthProbe;
pub use scheduler::HealthScheduler;
