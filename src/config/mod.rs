//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → consumed once at construction by each subsystem
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new RouterConfig sent over a channel
//!     → daemon re-imports servers and the fallback chain
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, FallbackConfig, HealthCheckConfig, HostedFallbackConfig, LogFormat, ObservabilityConfig,
    PersistenceConfig, RetryConfig, RouterConfig, StreamingConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
