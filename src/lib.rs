//! Client-side multi-backend inference router.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller ──▶ gateway::InferenceManager
//!                 │
//!                 ├─▶ selection (best server, then fallback chain)
//!                 │       │ reads
//!                 │       ▼
//!                 │   registry ◀── writes ── health::HealthScheduler
//!                 │                               │ fan-out
//!                 │                               ▼
//!                 │                          health::HealthProbe ──▶ servers
//!                 │
//!                 └─▶ streaming::InferenceClient ──▶ server
//!                         │ bytes
//!                         ▼
//!                     SseDecoder ──▶ bounded channel ──▶ ChatStream
//!
//!   any failure ──▶ diagnostics::classify ──▶ ClassifiedError
//! ```
//!
//! Cross-cutting: `config`, `observability`, `resilience`, `lifecycle`, `admin`.

pub mod admin;
pub mod config;
pub mod diagnostics;
pub mod gateway;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod selection;
pub mod streaming;

pub use config::RouterConfig;
pub use diagnostics::{classify, ClassifiedError, ErrorKind};
pub use gateway::{GatewayError, InferenceManager};
pub use lifecycle::Shutdown;
pub use registry::{ServerConfig, ServerRegistry, ServerStatus};
pub use selection::{SelectionConstraints, Target};
pub use streaming::{ChatMessage, ChatRequest, ChatStream, StreamEvent};
