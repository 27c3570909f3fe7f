//! Failure diagnostics subsystem.
//!
//! # Data Flow
//! ```text
//! Raw failure (reqwest error, HTTP status, parse error)
//!     → classifier.rs (normalize to (message, status) once, at the transport boundary)
//!     → kind.rs (tagged ErrorKind with explanation + suggestion)
//!     → ClassifiedError (logged, surfaced, fed to retry decisions)
//! ```
//!
//! # Design Decisions
//! - Classification is a pure function of `(message, status)`
//! - Classification never changes control flow; callers decide what to do
//! - Every surfaced error carries kind, status, timestamp and a suggestion

pub mod classifier;
pub mod kind;

pub use classifier::{classify, classify_kind, ClassifiedError, ErrorContext};
pub use kind::ErrorKind;
