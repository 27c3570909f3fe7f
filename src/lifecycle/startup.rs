//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve the initial server set (config, then persisted store, then defaults)
//! - Build the inference manager around it
//! - Run one immediate probe round, then start the periodic scheduler
//!
//! # Design Decisions
//! - Fail fast: an unreadable store or unbuildable client is fatal
//! - Selection is usable as soon as bootstrap returns (statuses populated)

use std::sync::Arc;

use thiserror::Error;

use crate::config::RouterConfig;
use crate::gateway::{GatewayError, InferenceManager};
use crate::registry::store::save_registry;
use crate::registry::{FileStore, RegistryStore, ServerConfig, ServerRegistry, StoreError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to load persisted registry: {0}")]
    Store(#[from] StoreError),
}

/// Where the initial server set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerSource {
    Config,
    Store,
    Defaults,
}

/// Everything bootstrap produced.
pub struct Runtime {
    pub manager: Arc<InferenceManager>,
    pub store: Option<Arc<dyn RegistryStore>>,
    pub source: ServerSource,
}

/// Servers installed when neither config nor store provide any.
pub fn default_servers() -> Vec<ServerConfig> {
    let local = |id: &str, name: &str, port: u16, model: &str, priority: i32, max_tokens: u32, description: &str| {
        let mut server = ServerConfig::new(id, format!("http://localhost:{port}/api/v1"), model)
            .with_priority(priority)
            .with_capabilities(["chat", "completion"])
            .with_max_tokens(max_tokens);
        server.name = name.to_string();
        server.description = Some(description.to_string());
        server
    };

    vec![
        local("local-qwen", "Local Qwen Server", 8443, "qwen3-coder-max", 1, 32768, "Local Qwen Coder model server"),
        local("internal-llm-1", "Internal LLM Server 1", 8080, "internal-llm-model", 2, 16384, "Internal LLM server instance 1"),
        local("internal-llm-2", "Internal LLM Server 2", 3000, "internal-llm-model", 3, 16384, "Internal LLM server instance 2"),
    ]
}

/// Resolve the server set and the store it should be persisted through.
pub fn resolve_servers(
    config: &RouterConfig,
    store: Option<&dyn RegistryStore>,
) -> Result<(Vec<ServerConfig>, ServerSource), StoreError> {
    if !config.servers.is_empty() {
        return Ok((config.servers.clone(), ServerSource::Config));
    }
    if let Some(store) = store {
        let persisted = store.load()?;
        if !persisted.is_empty() {
            return Ok((persisted, ServerSource::Store));
        }
    }
    Ok((default_servers(), ServerSource::Defaults))
}

/// Build and start the router described by `config`.
pub async fn bootstrap(config: &RouterConfig) -> Result<Runtime, StartupError> {
    let store: Option<Arc<dyn RegistryStore>> = config
        .persistence
        .path
        .as_ref()
        .map(|path| Arc::new(FileStore::new(path.clone())) as Arc<dyn RegistryStore>);

    let (servers, source) = resolve_servers(config, store.as_deref())?;
    tracing::info!(count = servers.len(), source = ?source, "Server set resolved");

    let registry = Arc::new(ServerRegistry::with_servers(servers));
    if source == ServerSource::Defaults {
        if let Some(store) = &store {
            if let Err(e) = save_registry(&registry, store.as_ref()) {
                tracing::warn!(error = %e, "Failed to persist default server set");
            }
        }
    }

    let manager = Arc::new(InferenceManager::with_registry(registry, config)?);

    if config.health_check.enabled {
        let statuses = manager.scheduler().probe_all().await;
        let healthy = statuses.iter().filter(|s| s.is_healthy).count();
        tracing::info!(probed = statuses.len(), healthy, "Initial health check complete");
        manager.start_health_checks();
    }

    Ok(Runtime { manager, store, source })
}
