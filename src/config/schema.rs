//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::registry::ServerConfig;

/// Root configuration for the inference router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Inference backends. Empty means "use the persisted or default set".
    pub servers: Vec<ServerConfig>,

    /// Periodic reachability probing.
    pub health_check: HealthCheckConfig,

    /// HTTP client and stream decoding settings.
    pub streaming: StreamingConfig,

    /// Ordered failover chain.
    pub fallback: FallbackConfig,

    /// Retry policy for the failover request path.
    pub retries: RetryConfig,

    /// Where the registry is persisted between runs.
    pub persistence: PersistenceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Health check configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic scheduler.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Accept self-signed certificates (local servers commonly use them).
    pub accept_invalid_certs: bool,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            accept_invalid_certs: true,
        }
    }
}

/// Streaming client configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Upper bound for a non-streaming request in seconds.
    pub request_timeout_secs: u64,

    /// Keep-alive sockets retained per host.
    pub pool_max_idle_per_host: usize,

    /// Capacity of each stream's event channel.
    pub channel_capacity: usize,

    /// Default `max_tokens` sent with every request.
    pub max_tokens: u32,

    pub temperature: f32,

    pub accept_invalid_certs: bool,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
            pool_max_idle_per_host: 8,
            channel_capacity: 64,
            max_tokens: 2000,
            temperature: 0.7,
            accept_invalid_certs: true,
        }
    }
}

/// Failover chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FallbackConfig {
    /// Server ids tried in order; `hosted-fallback` names the hosted endpoint.
    pub chain: Vec<String>,

    /// External endpoint that is always considered available.
    pub hosted: Option<HostedFallbackConfig>,
}

/// External hosted endpoint used as the last resort.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostedFallbackConfig {
    pub name: String,
    pub base_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of targets tried per request.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Registry persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PersistenceConfig {
    /// JSON document path. No persistence when unset.
    pub path: Option<PathBuf>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,

    pub bind_address: String,

    /// Bearer token required on every admin request. Open when unset.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:9091".to_string(),
            api_key: None,
        }
    }
}
