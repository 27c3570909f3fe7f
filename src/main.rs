//! Inference router daemon.
//!
//! Usage: `inference-router [config.toml]`
//!
//! Loads the config (defaults when no path is given), bootstraps the
//! registry and health scheduler, serves the admin API when enabled, applies
//! config file changes live, and shuts down gracefully on SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use inference_router::admin::{serve_admin, AdminState};
use inference_router::config::{load_config, ConfigWatcher, RouterConfig};
use inference_router::lifecycle::signals::spawn_signal_handler;
use inference_router::lifecycle::{bootstrap, graceful_shutdown, Shutdown};
use inference_router::observability::{logging::init_logging, metrics::init_metrics};
use tokio::net::TcpListener;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "inference-router starting");
    tracing::info!(
        config = ?config_path,
        servers = config.servers.len(),
        probe_interval_secs = config.health_check.interval_secs,
        fallback_chain = ?config.fallback.chain,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let runtime = bootstrap(&config).await?;
    let manager = Arc::clone(&runtime.manager);

    let shutdown = Arc::new(Shutdown::new());
    let mut shutdown_rx = shutdown.subscribe();
    spawn_signal_handler(Arc::clone(&shutdown));

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(Arc::clone(&manager), config.admin.api_key.clone());
        Some(tokio::spawn(serve_admin(listener, state, shutdown.subscribe())))
    } else {
        None
    };

    // Kept alive for the lifetime of the process.
    let _watcher = match &config_path {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            let manager = Arc::clone(&manager);
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(new_config) = updates.recv() => {
                            manager.apply_config(&new_config);
                            tracing::info!(servers = manager.registry().len(), "Configuration reloaded");
                        }
                        _ = stop.recv() => break,
                        else => break,
                    }
                }
            });
            Some(handle)
        }
        None => None,
    };

    tracing::info!(servers = manager.registry().len(), "inference-router ready");

    if shutdown_rx.recv().await.is_err() {
        tracing::warn!("Shutdown channel closed unexpectedly");
    }

    let completed = graceful_shutdown(manager, runtime.store, SHUTDOWN_DEADLINE).await;

    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin task panicked"),
            Ok(Ok(())) => {}
        }
    }

    tracing::info!(clean = completed, "Shutdown complete");
    Ok(())
}
