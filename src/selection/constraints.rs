//! Per-request selection constraints.

use std::collections::HashSet;

/// Ephemeral constraints for one selection. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionConstraints {
    /// Candidate must advertise this capability tag.
    pub capability: Option<String>,
    /// Candidate must accept at least this many tokens (unbounded servers pass).
    pub max_tokens: Option<u32>,
    /// Returned immediately if it survives the capability/token filters.
    pub preferred_server_id: Option<String>,
    pub exclude_server_ids: HashSet<String>,
}

impl SelectionConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn prefer(mut self, server_id: impl Into<String>) -> Self {
        self.preferred_server_id = Some(server_id.into());
        self
    }

    pub fn exclude(mut self, server_id: impl Into<String>) -> Self {
        self.exclude_server_ids.insert(server_id.into());
        self
    }

    pub fn is_excluded(&self, server_id: &str) -> bool {
        self.exclude_server_ids.contains(server_id)
    }
}
