//! Server registry subsystem.
//!
//! # Data Flow
//! ```text
//! Caller (admin, bootstrap, config reload)
//!     → manager.rs (add / remove / activate / priority / import)
//!
//! Health scheduler
//!     → manager.rs (set_status, overwriting the previous probe result)
//!
//! Selector, admin API
//!     → manager.rs (read-only snapshots)
//!
//! Persistence collaborator
//!     ↔ store.rs (load / save hooks)
//! ```
//!
//! # Design Decisions
//! - The registry is an explicit instance shared via `Arc`, never a global
//! - Mutation is serialized behind a lock; reads take consistent snapshots

pub mod manager;
pub mod server;
pub mod store;

pub use manager::{RegistryStats, ServerRegistry};
pub use server::{ServerConfig, ServerStatus};
pub use store::{FileStore, MemoryStore, RegistryStore, StoreError};
