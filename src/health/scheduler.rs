//! Periodic health scheduler.
//!
//! # Responsibilities
//! - Run one probe round per tick against every active server
//! - Write each result into the registry as soon as it completes
//! - Own the background task through an explicit start/stop handle
//!
//! # Design Decisions
//! - Probes in a round run concurrently, each under its own timeout, and the
//!   next tick waits for the whole round
//! - `start` replaces a running loop instead of stacking a second one
//! - `stop` cancels the timer but lets the in-flight round drain

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::health::probe::HealthProbe;
use crate::registry::{ServerRegistry, ServerStatus};

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    interval: Duration,
}

/// Drives `HealthProbe` over the registry on a fixed interval.
pub struct HealthScheduler {
    registry: Arc<ServerRegistry>,
    probe: Arc<HealthProbe>,
    running: Mutex<Option<RunningLoop>>,
}

impl HealthScheduler {
    pub fn new(registry: Arc<ServerRegistry>, probe: HealthProbe) -> Self {
        Self {
            registry,
            probe: Arc::new(probe),
            running: Mutex::new(None),
        }
    }

    /// Start probing every `interval`. The first round fires after one
    /// interval; call [`probe_all`](Self::probe_all) first for an immediate one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, interval: Duration) {
        if interval.is_zero() {
            tracing::warn!("Refusing to start health scheduler with a zero interval");
            return;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.registry),
            Arc::clone(&self.probe),
            interval,
            cancel.clone(),
        ));

        let previous = self.running.lock().replace(RunningLoop {
            cancel,
            handle,
            interval,
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
            tracing::info!(
                old_interval_secs = previous.interval.as_secs(),
                new_interval_secs = interval.as_secs(),
                "Health scheduler restarted"
            );
        } else {
            tracing::info!(interval_secs = interval.as_secs(), "Health scheduler started");
        }
    }

    /// Stop the timer and wait for the in-flight round, if any, to finish.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            tracing::error!(error = %e, "Health scheduler task failed");
        }
        tracing::info!("Health scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().as_ref().is_some_and(|r| !r.handle.is_finished())
    }

    pub fn interval(&self) -> Option<Duration> {
        self.running.lock().as_ref().map(|r| r.interval)
    }

    /// Probe every active server now and record the results.
    pub async fn probe_all(&self) -> Vec<ServerStatus> {
        probe_round(&self.registry, &self.probe).await
    }

    /// Probe one server now, active or not. `None` for an unknown id.
    pub async fn probe_server(&self, id: &str) -> Option<ServerStatus> {
        let server = self.registry.get(id)?;
        let status = self.probe.probe(&server).await;
        self.registry.set_status(status.clone());
        Some(status)
    }
}

async fn run_loop(
    registry: Arc<ServerRegistry>,
    probe: Arc<HealthProbe>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Health scheduler received cancellation, exiting loop");
                break;
            }
            _ = ticker.tick() => {
                // Not raced against cancellation: a started round drains.
                probe_round(&registry, &probe).await;
            }
        }
    }
}

async fn probe_round(registry: &Arc<ServerRegistry>, probe: &Arc<HealthProbe>) -> Vec<ServerStatus> {
    let servers = registry.list_active();
    if servers.is_empty() {
        tracing::debug!("No active servers to probe");
        return Vec::new();
    }

    let probes = servers.into_iter().map(|server| async move {
        let status = probe.probe(&server).await;
        registry.set_status(status.clone());
        status
    });
    let statuses = join_all(probes).await;

    let healthy = statuses.iter().filter(|s| s.is_healthy).count();
    tracing::info!(probed = statuses.len(), healthy, "Health check round complete");
    statuses
}
