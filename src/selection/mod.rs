//! Server selection subsystem.
//!
//! # Data Flow
//! ```text
//! Request path
//!     → constraints.rs (capability, token bound, preference, exclusions)
//!     → best.rs (pure choice over a registry snapshot)
//!     → fallback.rs (explicit failover chain when best yields nothing)
//!     → Target handed to the streaming client
//! ```
//!
//! # Design Decisions
//! - Selection is synchronous and read-only; it never triggers a probe
//! - Unknown or unhealthy status is never selectable
//! - Priority ties resolve by latency, then by id

pub mod best;
pub mod constraints;
pub mod fallback;

pub use best::select_best;
pub use constraints::SelectionConstraints;
pub use fallback::{FallbackEntry, Selector, Target, HOSTED_FALLBACK_ID};
