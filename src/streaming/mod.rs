//! Streaming subsystem.
//!
//! # Data Flow
//! ```text
//! Target + ChatRequest
//!     → client.rs (POST stream:true; non-2xx → ClassifiedError)
//!     → reader task on active.rs's tracker
//!         → decoder.rs (bytes → lines → deltas → final)
//!         → bounded mpsc channel
//!     → ChatStream (futures Stream; cancel via token or drop)
//!
//! Shutdown:
//!     client.rs cancels the root token → active.rs drains readers
//!     → connection pool dropped
//! ```
//!
//! # Design Decisions
//! - Decoding is a pure state machine, tested without a network
//! - Failure before the first byte is fatal; failure after is an abrupt close
//! - Every stream has its own cancellation handle

pub mod active;
pub mod client;
pub mod decoder;
pub mod types;

pub use client::{ChatStream, InferenceClient};
pub use decoder::SseDecoder;
pub use types::{ChatMessage, ChatRequest, Completion, Role, StreamEnd, StreamEvent, Usage};
