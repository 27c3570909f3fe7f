//! Server registry.
//!
//! # Responsibilities
//! - Own the canonical set of server configurations
//! - Own the last known status of each server
//! - Answer list/filter queries for the selector and the admin API
//!
//! # Design Decisions
//! - One `RwLock` guards configs and statuses together, so a status can never
//!   outlive its config and readers always see a consistent pair
//! - Mutations on unknown ids are no-ops that return `false`
//! - No file I/O here; persistence goes through `store.rs`

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;

use crate::registry::server::{ServerConfig, ServerStatus};

#[derive(Debug, Default)]
struct RegistryState {
    servers: HashMap<String, ServerConfig>,
    statuses: HashMap<String, ServerStatus>,
}

impl RegistryState {
    fn sorted(&self) -> Vec<ServerConfig> {
        let mut servers: Vec<ServerConfig> = self.servers.values().cloned().collect();
        // Ties broken by id so listings are stable.
        servers.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        servers
    }

    fn is_healthy(&self, id: &str) -> bool {
        self.statuses.get(id).is_some_and(|s| s.is_healthy)
    }
}

/// Aggregate counters over the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total_servers: usize,
    pub active_servers: usize,
    pub healthy_servers: usize,
    /// Mean latency over healthy statuses with a positive latency.
    pub avg_response_ms: u64,
}

/// Thread-safe registry of inference servers and their health.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    inner: RwLock<RegistryState>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated with `servers`.
    pub fn with_servers(servers: impl IntoIterator<Item = ServerConfig>) -> Self {
        let registry = Self::new();
        registry.import(servers);
        registry
    }

    /// Insert a server, replacing any existing entry with the same id.
    ///
    /// Returns `true` if an existing entry was replaced.
    pub fn add(&self, config: ServerConfig) -> bool {
        let id = config.id.clone();
        let replaced = self.inner.write().servers.insert(id.clone(), config).is_some();
        tracing::info!(server = %id, replaced, "Server added to registry");
        replaced
    }

    /// Remove a server and discard its status.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.inner.write();
        let removed = state.servers.remove(id).is_some();
        state.statuses.remove(id);
        if removed {
            tracing::info!(server = %id, "Server removed from registry");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<ServerConfig> {
        self.inner.read().servers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().servers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().servers.is_empty()
    }

    /// All servers, sorted by priority ascending.
    pub fn list(&self) -> Vec<ServerConfig> {
        self.inner.read().sorted()
    }

    pub fn list_active(&self) -> Vec<ServerConfig> {
        let state = self.inner.read();
        state.sorted().into_iter().filter(|s| s.is_active).collect()
    }

    /// Active servers whose last status is healthy.
    pub fn list_healthy(&self) -> Vec<ServerConfig> {
        let state = self.inner.read();
        state
            .sorted()
            .into_iter()
            .filter(|s| s.is_active && state.is_healthy(&s.id))
            .collect()
    }

    /// Every server paired with its last status, taken under one lock.
    pub fn snapshot(&self) -> Vec<(ServerConfig, Option<ServerStatus>)> {
        let state = self.inner.read();
        state
            .sorted()
            .into_iter()
            .map(|s| {
                let status = state.statuses.get(&s.id).cloned();
                (s, status)
            })
            .collect()
    }

    pub fn set_active(&self, id: &str, active: bool) -> bool {
        let mut state = self.inner.write();
        match state.servers.get_mut(id) {
            Some(server) => {
                server.is_active = active;
                tracing::info!(server = %id, active, "Server activation changed");
                true
            }
            None => false,
        }
    }

    pub fn set_priority(&self, id: &str, priority: i32) -> bool {
        let mut state = self.inner.write();
        match state.servers.get_mut(id) {
            Some(server) => {
                server.priority = priority;
                tracing::info!(server = %id, priority, "Server priority changed");
                true
            }
            None => false,
        }
    }

    pub fn status(&self, id: &str) -> Option<ServerStatus> {
        self.inner.read().statuses.get(id).cloned()
    }

    pub fn statuses(&self) -> Vec<ServerStatus> {
        let mut statuses: Vec<ServerStatus> = self.inner.read().statuses.values().cloned().collect();
        statuses.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        statuses
    }

    /// Store a probe result, overwriting the previous one.
    ///
    /// Results for servers that were removed while the probe was in flight
    /// are dropped; returns `false` in that case.
    pub fn set_status(&self, status: ServerStatus) -> bool {
        let mut state = self.inner.write();
        if !state.servers.contains_key(&status.server_id) {
            tracing::debug!(server = %status.server_id, "Dropping status for unknown server");
            return false;
        }
        state.statuses.insert(status.server_id.clone(), status);
        true
    }

    /// Current configs for an external persistence hook.
    pub fn export(&self) -> Vec<ServerConfig> {
        self.list()
    }

    /// Replace the whole server set.
    ///
    /// Statuses of servers that survive the import are kept; the rest are
    /// discarded along with their configs.
    pub fn import(&self, configs: impl IntoIterator<Item = ServerConfig>) {
        let mut state = self.inner.write();
        state.servers = configs.into_iter().map(|c| (c.id.clone(), c)).collect();
        let RegistryState { servers, statuses } = &mut *state;
        statuses.retain(|id, _| servers.contains_key(id));
        tracing::info!(count = state.servers.len(), "Server registry imported");
    }

    pub fn stats(&self) -> RegistryStats {
        let state = self.inner.read();
        let active: Vec<&ServerConfig> = state.servers.values().filter(|s| s.is_active).collect();
        let healthy_servers = active.iter().filter(|s| state.is_healthy(&s.id)).count();

        let latencies: Vec<u64> = state
            .statuses
            .values()
            .filter(|s| s.is_healthy && s.response_time_ms > 0)
            .map(|s| s.response_time_ms)
            .collect();
        let avg_response_ms = if latencies.is_empty() {
            0
        } else {
            let sum: u64 = latencies.iter().sum();
            let count = latencies.len() as u64;
            (sum + count / 2) / count
        };

        RegistryStats {
            total_servers: state.servers.len(),
            active_servers: active.len(),
            healthy_servers,
            avg_response_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: &str, priority: i32) -> ServerConfig {
        ServerConfig::new(id, format!("http://{id}.local/v1"), "model").with_priority(priority)
    }

    #[test]
    fn test_add_then_remove_discards_status() {
        let registry = ServerRegistry::new();
        let s = server("a", 1);
        registry.add(s.clone());
        assert!(registry.set_status(ServerStatus::healthy(&s, 10)));

        assert!(registry.remove("a"));
        assert!(registry.list().is_empty());
        assert!(registry.status("a").is_none());
        assert!(!registry.remove("a"));
    }

    #[test]
    fn test_list_sorted_by_priority() {
        let registry = ServerRegistry::with_servers(vec![server("c", 3), server("a", 1), server("b", 2)]);
        let ids: Vec<String> = registry.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let registry = ServerRegistry::new();
        assert!(!registry.set_active("ghost", false));
        assert!(!registry.set_priority("ghost", 5));
        assert!(!registry.set_status(ServerStatus::healthy(&server("ghost", 1), 5)));
        assert!(registry.statuses().is_empty());
    }

    #[test]
    fn test_healthy_requires_active_and_probed() {
        let a = server("a", 1);
        let b = server("b", 2);
        let c = server("c", 3);
        let registry = ServerRegistry::with_servers(vec![a.clone(), b.clone(), c.clone()]);

        registry.set_status(ServerStatus::healthy(&a, 10));
        registry.set_status(ServerStatus::unhealthy(&b, 10, "HTTP 500"));
        // c is never probed.
        assert_eq!(registry.list_healthy().len(), 1);

        registry.set_active("a", false);
        assert!(registry.list_healthy().is_empty());
        assert_eq!(registry.list_active().len(), 2);
    }

    #[test]
    fn test_set_priority_reorders() {
        let registry = ServerRegistry::with_servers(vec![server("a", 1), server("b", 2)]);
        assert!(registry.set_priority("b", 0));
        assert_eq!(registry.list()[0].id, "b");
    }

    #[test]
    fn test_import_keeps_surviving_statuses() {
        let a = server("a", 1);
        let b = server("b", 2);
        let registry = ServerRegistry::with_servers(vec![a.clone(), b.clone()]);
        registry.set_status(ServerStatus::healthy(&a, 10));
        registry.set_status(ServerStatus::healthy(&b, 10));

        registry.import(vec![a.clone(), server("c", 3)]);
        assert!(registry.status("a").is_some());
        assert!(registry.status("b").is_none());
        assert_eq!(registry.export().len(), 2);
    }

    #[test]
    fn test_stats() {
        let a = server("a", 1);
        let b = server("b", 2);
        let c = server("c", 3);
        let registry = ServerRegistry::with_servers(vec![a.clone(), b.clone(), c]);
        registry.set_active("c", false);
        registry.set_status(ServerStatus::healthy(&a, 10));
        registry.set_status(ServerStatus::healthy(&b, 21));

        let stats = registry.stats();
        assert_eq!(stats.total_servers, 3);
        assert_eq!(stats.active_servers, 2);
        assert_eq!(stats.healthy_servers, 2);
        assert_eq!(stats.avg_response_ms, 16);
    }
}
