//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Registry, health, selection, streaming produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap; recording without an exporter is a no-op
//! - Labels are bounded: server id, outcome, error kind

pub mod logging;
pub mod metrics;
