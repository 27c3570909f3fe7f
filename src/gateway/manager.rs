//! The inference manager.
//!
//! Owns the registry, selector, health scheduler and streaming client, and
//! runs requests through selection with failover.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use chrono::Utc;
use serde::Serialize;

use crate::config::{HealthCheckConfig, RetryConfig, RouterConfig, StreamingConfig};
use crate::diagnostics::ClassifiedError;
use crate::health::{HealthProbe, HealthScheduler};
use crate::registry::{ServerConfig, ServerRegistry};
use crate::resilience::{is_retryable, RetryPolicy};
use crate::selection::{SelectionConstraints, Selector, Target};
use crate::streaming::{ChatRequest, ChatStream, Completion, InferenceClient};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("request to '{server_id}' failed: {source}")]
    Request {
        server_id: String,
        #[source]
        source: ClassifiedError,
    },

    #[error("no eligible server (attempted: {})", attempted_list(.attempted))]
    NoEligibleServer {
        attempted: Vec<String>,
        last_error: Option<ClassifiedError>,
    },
}

fn attempted_list(attempted: &[String]) -> String {
    if attempted.is_empty() {
        "none".to_string()
    } else {
        attempted.join(", ")
    }
}

impl GatewayError {
    /// The classified failure behind this error, if one was observed.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            GatewayError::Request { source, .. } => Some(source),
            GatewayError::NoEligibleServer { last_error, .. } => last_error.as_ref(),
            GatewayError::Client(_) => None,
        }
    }
}

/// Priority given to servers registered through discovery.
pub const DISCOVERED_PRIORITY: i32 = 99;

/// Model name used when discovery does not name one.
pub const DISCOVERED_DEFAULT_MODEL: &str = "auto-detected-model";

/// Last known health of the current target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetHealth {
    Healthy,
    Unhealthy,
    Unknown,
}

/// The target a request would go to right now, and its health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub target: Option<Target>,
    pub status: TargetHealth,
}

/// A non-streaming completion plus the server that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedCompletion {
    pub server_id: String,
    pub completion: Completion,
}

pub struct InferenceManager {
    registry: Arc<ServerRegistry>,
    selector: Selector,
    scheduler: HealthScheduler,
    client: InferenceClient,
    retry: RetryPolicy,
    health_check: HealthCheckConfig,
    streaming: StreamingConfig,
    retries: RetryConfig,
}

impl InferenceManager {
    /// Build a manager whose registry holds `config.servers`.
    pub fn new(config: &RouterConfig) -> Result<Self, GatewayError> {
        let registry = Arc::new(ServerRegistry::with_servers(config.servers.clone()));
        Self::with_registry(registry, config)
    }

    /// Build a manager around an existing registry.
    pub fn with_registry(registry: Arc<ServerRegistry>, config: &RouterConfig) -> Result<Self, GatewayError> {
        let probe = HealthProbe::new(&config.health_check)?;
        let client = InferenceClient::new(&config.streaming)?;
        let selector = Selector::new(
            Arc::clone(&registry),
            &config.fallback.chain,
            config.fallback.hosted.clone(),
        );

        Ok(Self {
            scheduler: HealthScheduler::new(Arc::clone(&registry), probe),
            registry,
            selector,
            client,
            retry: RetryPolicy::new(&config.retries),
            health_check: config.health_check.clone(),
            streaming: config.streaming.clone(),
            retries: config.retries.clone(),
        })
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn scheduler(&self) -> &HealthScheduler {
        &self.scheduler
    }

    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.health_check.interval_secs)
    }

    /// Start periodic probing if it is enabled in the config.
    pub fn start_health_checks(&self) {
        if !self.health_check.enabled {
            tracing::info!("Periodic health checks disabled");
            return;
        }
        self.scheduler.start(self.probe_interval());
    }

    /// Apply a reloaded config: servers (when listed) and the fallback chain.
    ///
    /// The `health_check`, `streaming` and `retries` sections are fixed at
    /// construction. Changed values there are logged and returned by name;
    /// they take effect on restart.
    pub fn apply_config(&self, config: &RouterConfig) -> Vec<&'static str> {
        if !config.servers.is_empty() {
            self.registry.import(config.servers.clone());
        }
        self.selector.set_fallback_chain(&config.fallback.chain);
        self.selector.set_hosted_fallback(config.fallback.hosted.clone());

        let mut ignored = Vec::new();
        if config.health_check != self.health_check {
            ignored.push("health_check");
        }
        if config.streaming != self.streaming {
            ignored.push("streaming");
        }
        if config.retries != self.retries {
            ignored.push("retries");
        }
        if !ignored.is_empty() {
            tracing::warn!(sections = ?ignored, "Reloaded sections differ from running values; restart to apply");
        }
        ignored
    }

    /// Register a server found at `base_url` and probe it right away.
    ///
    /// Discovered servers get the lowest priority and chat + completion
    /// capabilities. Returns the new server id.
    pub async fn add_discovered_server(&self, base_url: &str, model: Option<&str>) -> String {
        let stamp = Utc::now().timestamp_millis();
        let mut id = format!("discovered-{stamp}");
        let mut suffix = 1;
        while self.registry.contains(&id) {
            id = format!("discovered-{stamp}-{suffix}");
            suffix += 1;
        }

        let mut server = ServerConfig::new(&id, base_url, model.unwrap_or(DISCOVERED_DEFAULT_MODEL))
            .with_priority(DISCOVERED_PRIORITY)
            .with_capabilities(["chat", "completion"]);
        server.name = format!("Discovered Server ({base_url})");
        server.description = Some("Automatically discovered server".to_string());
        self.registry.add(server);

        let healthy = self.scheduler.probe_server(&id).await.is_some_and(|s| s.is_healthy);
        tracing::info!(server = %id, base_url, healthy, "Discovered server added");
        id
    }

    /// The target an unconstrained request would use now, with its health.
    ///
    /// The hosted endpoint is assumed healthy; with no target at all the
    /// status is unknown.
    pub fn current_target_info(&self) -> TargetInfo {
        let Some(target) = self.select_target(&SelectionConstraints::new()) else {
            return TargetInfo {
                target: None,
                status: TargetHealth::Unknown,
            };
        };
        let status = if target.hosted {
            TargetHealth::Healthy
        } else {
            match self.registry.status(&target.server_id) {
                Some(status) if status.is_healthy => TargetHealth::Healthy,
                _ => TargetHealth::Unhealthy,
            }
        };
        TargetInfo {
            target: Some(target),
            status,
        }
    }

    /// Best target for `constraints`, falling back to the failover chain.
    pub fn select_target(&self, constraints: &SelectionConstraints) -> Option<Target> {
        self.selector
            .select_best(constraints)
            .map(|server| Target::from(&server))
            .or_else(|| self.selector.select_fallback(&constraints.exclude_server_ids))
    }

    /// Open a stream on the best available server, failing over on
    /// connection, timeout and server errors.
    pub async fn stream_chat(
        &self,
        request: &ChatRequest,
        constraints: SelectionConstraints,
    ) -> Result<ChatStream, GatewayError> {
        let (_, stream) = self
            .with_failover(request, constraints, |client, target, request| async move {
                client.open_stream(&target, request).await
            })
            .await?;
        Ok(stream)
    }

    /// Run a non-streaming completion with the same failover as
    /// [`stream_chat`](Self::stream_chat).
    pub async fn chat(
        &self,
        request: &ChatRequest,
        constraints: SelectionConstraints,
    ) -> Result<RoutedCompletion, GatewayError> {
        let (target, completion) = self
            .with_failover(request, constraints, |client, target, request| async move {
                client.complete(&target, request).await
            })
            .await?;
        Ok(RoutedCompletion {
            server_id: target.server_id,
            completion,
        })
    }

    /// Stop probing, cancel and drain all streams, release the pool.
    pub async fn shutdown(&self) {
        self.scheduler.stop().await;
        self.client.shutdown().await;
        tracing::info!("Inference manager shut down");
    }

    async fn with_failover<'a, T, F, Fut>(
        &'a self,
        request: &'a ChatRequest,
        mut constraints: SelectionConstraints,
        op: F,
    ) -> Result<(Target, T), GatewayError>
    where
        F: Fn(&'a InferenceClient, Target, &'a ChatRequest) -> Fut,
        Fut: Future<Output = Result<T, ClassifiedError>> + 'a,
    {
        let mut attempted = Vec::new();
        let mut last_error = None;

        for attempt in 0..self.retry.max_attempts() {
            let Some(target) = self.select_target(&constraints) else {
                break;
            };
            if attempt > 0 {
                tokio::time::sleep(self.retry.delay(attempt)).await;
            }

            match op(&self.client, target.clone(), request).await {
                Ok(value) => return Ok((target, value)),
                Err(error) => {
                    attempted.push(target.server_id.clone());
                    if !is_retryable(error.kind) {
                        return Err(GatewayError::Request {
                            server_id: target.server_id,
                            source: error,
                        });
                    }

                    tracing::warn!(
                        server = %target.server_id,
                        kind = %error.kind,
                        attempt = attempt + 1,
                        "Target failed, trying next server"
                    );
                    // A failed target is never tried again for this request,
                    // preferred or not.
                    if constraints.preferred_server_id.as_deref() == Some(target.server_id.as_str()) {
                        constraints.preferred_server_id = None;
                    }
                    constraints.exclude_server_ids.insert(target.server_id);
                    last_error = Some(error);
                }
            }
        }

        tracing::error!(attempted = ?attempted, "No eligible server for request");
        Err(GatewayError::NoEligibleServer { attempted, last_error })
    }
}
