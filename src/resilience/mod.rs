//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to a target fails:
//!     → ClassifiedError (diagnostics)
//!     → retries.rs (retryable kind? attempts left?)
//!     → backoff.rs (wait before the next target)
//!     → selection excludes the failed target
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline (probe timeout, connect/request timeouts)
//! - A failed target is excluded for the rest of the request, never retried
//! - Jittered backoff prevents thundering herd

pub mod backoff;
pub mod retries;

pub use retries::{is_retryable, RetryPolicy};
