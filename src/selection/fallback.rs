//! Selector: best-server choice plus the explicit failover chain.
//!
//! # Responsibilities
//! - Answer `select_best` against the registry's last known state
//! - Walk the ordered fallback chain, ending at the hosted endpoint if configured
//! - Turn either answer into a `Target` the streaming client can dial
//!
//! # Design Decisions
//! - The chain is swapped atomically (`ArcSwap`); readers never block writers
//! - The hosted sentinel is always considered available when reached
//! - Selection never probes; staleness is bounded by the probe interval

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use serde::Serialize;

use crate::config::HostedFallbackConfig;
use crate::observability::metrics;
use crate::registry::{ServerConfig, ServerRegistry};
use crate::selection::best::select_best;
use crate::selection::constraints::SelectionConstraints;

/// Reserved chain id for the external hosted endpoint.
pub const HOSTED_FALLBACK_ID: &str = "hosted-fallback";

/// One position in the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackEntry {
    Server(String),
    Hosted,
}

impl FallbackEntry {
    pub fn parse(id: &str) -> Self {
        if id == HOSTED_FALLBACK_ID {
            FallbackEntry::Hosted
        } else {
            FallbackEntry::Server(id.to_string())
        }
    }

    pub fn id(&self) -> &str {
        match self {
            FallbackEntry::Server(id) => id,
            FallbackEntry::Hosted => HOSTED_FALLBACK_ID,
        }
    }
}

/// Endpoint a request should be sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub server_id: String,
    pub name: String,
    pub base_url: String,
    pub model: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Largest `max_tokens` the endpoint accepts, if bounded.
    pub max_tokens: Option<u32>,
    pub hosted: bool,
}

impl Target {
    pub fn completions_url(&self) -> String {
        crate::registry::server::completions_url(&self.base_url)
    }
}

impl From<&ServerConfig> for Target {
    fn from(server: &ServerConfig) -> Self {
        Self {
            server_id: server.id.clone(),
            name: server.name.clone(),
            base_url: server.base_url.clone(),
            model: server.model.clone(),
            api_key: server.api_key.clone(),
            max_tokens: server.max_tokens,
            hosted: false,
        }
    }
}

impl From<&HostedFallbackConfig> for Target {
    fn from(hosted: &HostedFallbackConfig) -> Self {
        Self {
            server_id: HOSTED_FALLBACK_ID.to_string(),
            name: hosted.name.clone(),
            base_url: hosted.base_url.clone(),
            model: hosted.model.clone(),
            api_key: hosted.api_key.clone(),
            max_tokens: None,
            hosted: true,
        }
    }
}

/// Picks servers from a shared registry.
pub struct Selector {
    registry: Arc<ServerRegistry>,
    chain: ArcSwap<Vec<FallbackEntry>>,
    hosted: ArcSwapOption<HostedFallbackConfig>,
}

impl Selector {
    pub fn new(registry: Arc<ServerRegistry>, chain: &[String], hosted: Option<HostedFallbackConfig>) -> Self {
        Self {
            registry,
            chain: ArcSwap::from_pointee(parse_chain(chain)),
            hosted: ArcSwapOption::from(hosted.map(Arc::new)),
        }
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    /// Best eligible server for `constraints`, or `None`.
    pub fn select_best(&self, constraints: &SelectionConstraints) -> Option<ServerConfig> {
        let selected = select_best(&self.registry.snapshot(), constraints);
        match &selected {
            Some(server) => {
                tracing::debug!(server = %server.id, priority = server.priority, "Selected server");
                metrics::record_selection("best");
            }
            None => {
                tracing::debug!(
                    capability = ?constraints.capability,
                    excluded = constraints.exclude_server_ids.len(),
                    "No eligible server"
                );
                metrics::record_selection("none");
            }
        }
        selected
    }

    /// First chain entry that is not excluded and, for real servers, is
    /// currently active and healthy. The hosted entry is returned
    /// unconditionally once reached.
    pub fn select_fallback(&self, exclude: &HashSet<String>) -> Option<Target> {
        let chain = self.chain.load();
        for entry in chain.iter() {
            if exclude.contains(entry.id()) {
                continue;
            }
            match entry {
                FallbackEntry::Server(id) => {
                    let Some(server) = self.registry.get(id) else {
                        continue;
                    };
                    let healthy = self.registry.status(id).is_some_and(|s| s.is_healthy);
                    if server.is_active && healthy {
                        tracing::info!(server = %id, "Using fallback server");
                        metrics::record_selection("fallback");
                        return Some(Target::from(&server));
                    }
                }
                FallbackEntry::Hosted => match self.hosted.load_full() {
                    Some(hosted) => {
                        tracing::warn!(endpoint = %hosted.base_url, "Using hosted fallback endpoint");
                        metrics::record_selection("hosted");
                        return Some(Target::from(hosted.as_ref()));
                    }
                    None => {
                        tracing::warn!("Fallback chain reached hosted entry but no hosted endpoint is configured");
                    }
                },
            }
        }
        metrics::record_selection("none");
        None
    }

    /// Replace the fallback chain.
    pub fn set_fallback_chain(&self, chain: &[String]) {
        self.chain.store(Arc::new(parse_chain(chain)));
        tracing::info!(chain = ?chain, "Fallback chain updated");
    }

    /// Replace (or remove) the hosted endpoint.
    pub fn set_hosted_fallback(&self, hosted: Option<HostedFallbackConfig>) {
        tracing::info!(configured = hosted.is_some(), "Hosted fallback endpoint updated");
        self.hosted.store(hosted.map(Arc::new));
    }

    pub fn hosted_fallback(&self) -> Option<HostedFallbackConfig> {
        self.hosted.load_full().map(|h| h.as_ref().clone())
    }

    pub fn fallback_chain(&self) -> Vec<String> {
        self.chain.load().iter().map(|e| e.id().to_string()).collect()
    }
}

fn parse_chain(ids: &[String]) -> Vec<FallbackEntry> {
    ids.iter().map(|id| FallbackEntry::parse(id)).collect()
}
