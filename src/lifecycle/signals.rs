//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (ctrl-c) or SIGTERM
//! - Translate the first one into a shutdown broadcast
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Non-unix platforms only get ctrl-c

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

/// Resolve when the process is asked to stop.
#[cfg(unix)]
pub async fn wait_for_signal() -> Signal {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c() => Signal::Interrupt,
                _ = term.recv() => Signal::Terminate,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler, listening for ctrl-c only");
            ctrl_c().await
        }
    }
}

/// Resolve when the process is asked to stop.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> Signal {
    ctrl_c().await
}

async fn ctrl_c() -> Signal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    Signal::Interrupt
}

/// Spawn a task that triggers `shutdown` on the first signal.
pub fn spawn_signal_handler(shutdown: Arc<Shutdown>) -> JoinHandle<Signal> {
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        tracing::info!(signal = ?signal, "Shutdown signal received");
        shutdown.trigger();
        signal
    })
}
