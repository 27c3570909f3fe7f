//! Shutdown coordination.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::gateway::InferenceManager;
use crate::registry::store::save_registry;
use crate::registry::RegistryStore;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let notified = self.tx.send(()).unwrap_or(0);
        tracing::debug!(notified, "Shutdown signal broadcast");
    }

    /// Number of tasks still subscribed.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered teardown: stop probing, cancel and drain streams, drop the pool,
/// then persist the registry.
///
/// Returns `false` if the deadline passed before teardown finished.
pub async fn graceful_shutdown(
    manager: Arc<InferenceManager>,
    store: Option<Arc<dyn RegistryStore>>,
    deadline: Duration,
) -> bool {
    tracing::info!(
        deadline_secs = deadline.as_secs(),
        open_streams = manager.client().active_stream_count(),
        "Graceful shutdown started"
    );

    let completed = tokio::time::timeout(deadline, manager.shutdown()).await.is_ok();
    if !completed {
        tracing::warn!("Shutdown deadline exceeded, abandoning remaining streams");
    }

    if let Some(store) = store {
        if let Err(e) = save_registry(manager.registry(), store.as_ref()) {
            tracing::error!(error = %e, "Failed to persist registry on shutdown");
        }
    }

    completed
}
