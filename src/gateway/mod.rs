//! Request-path facade.
//!
//! # Data Flow
//! ```text
//! Caller (daemon, admin API, embedding application)
//!     → manager.rs (InferenceManager)
//!         → selection (best, then fallback chain)
//!         → streaming client (open stream / complete)
//!         → on retryable failure: exclude target, back off, select again
//! ```
//!
//! # Design Decisions
//! - One explicitly constructed manager owns every component; no globals
//! - Health probing runs as an owned task started and stopped by the manager

pub mod manager;

pub use manager::{GatewayError, InferenceManager, RoutedCompletion, TargetHealth, TargetInfo};
