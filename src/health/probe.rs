//! Single-server reachability probe.
//!
//! # Responsibilities
//! - Send a one-token "ping" to a server's chat-completion endpoint
//! - Measure wall-clock latency under a hard timeout
//! - Turn every outcome into a `ServerStatus`; never fail
//!
//! # Design Decisions
//! - Any status in `[200, 500)` counts as reachable: a 401 or 404 still proves
//!   the server is up, and correctness is the request path's concern
//! - Only the status line is observed; the body is never read

use std::time::{Duration, Instant};

use reqwest::header::AUTHORIZATION;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::diagnostics::ClassifiedError;
use crate::observability::metrics;
use crate::registry::{ServerConfig, ServerStatus};
use crate::streaming::types::ChatCompletionRequest;

/// Bounded connectivity check against one server.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(config: &HealthCheckConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(concat!("inference-router-probe/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Override the per-probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe `server` once.
    pub async fn probe(&self, server: &ServerConfig) -> ServerStatus {
        let url = server.completions_url();
        let mut request = self.client.post(&url).json(&ChatCompletionRequest::ping(&server.model));
        if let Some(key) = &server.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        let start = Instant::now();
        let outcome = time::timeout(self.timeout, request.send()).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let status = match outcome {
            Ok(Ok(response)) => {
                let code = response.status().as_u16();
                if is_reachable(code) {
                    tracing::debug!(server = %server.id, status = code, latency_ms = elapsed_ms, "Probe succeeded");
                    ServerStatus::healthy(server, elapsed_ms)
                } else {
                    tracing::warn!(server = %server.id, status = code, "Probe failed: server error");
                    ServerStatus::unhealthy(server, elapsed_ms, format!("HTTP {code}"))
                }
            }
            Ok(Err(e)) => {
                let classified = ClassifiedError::from_reqwest(&e, &url);
                tracing::warn!(server = %server.id, kind = %classified.kind, error = %classified.message, "Probe failed");
                ServerStatus::unhealthy(server, elapsed_ms, classified.to_string())
            }
            Err(_) => {
                tracing::warn!(server = %server.id, timeout_ms = self.timeout.as_millis() as u64, "Probe failed: timeout");
                ServerStatus::unhealthy(
                    server,
                    elapsed_ms,
                    format!("timeout after {}ms", self.timeout.as_millis()),
                )
            }
        };

        metrics::record_probe(&server.id, status.is_healthy, elapsed_ms);
        status
    }
}

/// Reachability rule for a probe response status.
pub fn is_reachable(status: u16) -> bool {
    (200..500).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reachable_range() {
        assert!(is_reachable(200));
        assert!(is_reachable(401));
        assert!(is_reachable(404));
        assert!(is_reachable(499));
        assert!(!is_reachable(500));
        assert!(!is_reachable(503));
        assert!(!is_reachable(199));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unhealthy() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = HealthProbe::new(&HealthCheckConfig::default()).unwrap();
        let server = ServerConfig::new("down", format!("http://127.0.0.1:{port}/v1"), "m");
        let status = probe.probe(&server).await;

        assert!(!status.is_healthy);
        assert!(status.last_error.is_some());
    }
}
