//! Server configuration and status types.
//!
//! # Responsibilities
//! - Describe one inference backend (identity, endpoint, policy)
//! - Record the last observed health of a backend
//!
//! # Design Decisions
//! - `ServerConfig` serializes in camelCase so the persisted document stays
//!   compatible with existing `models.json` files; snake_case aliases keep
//!   TOML configs idiomatic
//! - A missing `ServerStatus` means "never probed", which is not healthy

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity and selection policy for one backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Unique key across the registry.
    pub id: String,

    /// Display name.
    pub name: String,

    /// OpenAI-compatible API root, e.g. `http://localhost:8080/api/v1`.
    #[serde(alias = "base_url")]
    pub base_url: String,

    /// Sent as `Authorization: Bearer <key>` when present.
    #[serde(default, alias = "api_key", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name sent in every request.
    pub model: String,

    /// Lower value = higher precedence. Not required to be unique.
    #[serde(default = "default_priority")]
    pub priority: i32,

    #[serde(default = "default_active", alias = "is_active")]
    pub is_active: bool,

    /// Feature tags such as "chat" or "completion".
    #[serde(default)]
    pub capabilities: BTreeSet<String>,

    /// Largest `max_tokens` this server accepts, if bounded.
    #[serde(default, alias = "max_tokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_priority() -> i32 {
    100
}

fn default_active() -> bool {
    true
}

impl ServerConfig {
    /// Create an active server with no capabilities and default priority.
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            priority: default_priority(),
            is_active: true,
            capabilities: BTreeSet::new(),
            max_tokens: None,
            description: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// Chat-completion endpoint for this server.
    pub fn completions_url(&self) -> String {
        completions_url(&self.base_url)
    }
}

/// Join an API root with the chat-completion path.
pub fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Last observed health of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub server_id: String,
    pub is_healthy: bool,
    /// Wall-clock probe latency.
    pub response_time_ms: u64,
    pub last_checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Capabilities of the server at probe time.
    pub capabilities: BTreeSet<String>,
}

impl ServerStatus {
    pub fn healthy(server: &ServerConfig, response_time_ms: u64) -> Self {
        Self {
            server_id: server.id.clone(),
            is_healthy: true,
            response_time_ms,
            last_checked_at: Utc::now(),
            last_error: None,
            capabilities: server.capabilities.clone(),
        }
    }

    pub fn unhealthy(server: &ServerConfig, response_time_ms: u64, error: impl Into<String>) -> Self {
        Self {
            server_id: server.id.clone(),
            is_healthy: false,
            response_time_ms,
            last_checked_at: Utc::now(),
            last_error: Some(error.into()),
            capabilities: server.capabilities.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url_trims_slash() {
        assert_eq!(
            completions_url("http://localhost:8080/api/v1/"),
            "http://localhost:8080/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_persisted_document_is_camel_case() {
        let server = ServerConfig::new("a", "http://localhost:1", "m").with_max_tokens(512);
        let json = serde_json::to_value(&server).unwrap();
        assert_eq!(json["baseUrl"], "http://localhost:1");
        assert_eq!(json["isActive"], true);
        assert_eq!(json["maxTokens"], 512);
        assert!(json.get("apiKey").is_none());
    }

    #[test]
    fn test_toml_accepts_snake_case() {
        let server: ServerConfig = toml::from_str(
            r#"
            id = "local"
            name = "Local"
            base_url = "http://localhost:8080/v1"
            model = "qwen"
            priority = 1
            is_active = false
            capabilities = ["chat"]
            max_tokens = 4096
            "#,
        )
        .unwrap();
        assert_eq!(server.base_url, "http://localhost:8080/v1");
        assert!(!server.is_active);
        assert!(server.has_capability("chat"));
        assert_eq!(server.max_tokens, Some(4096));
    }
}
