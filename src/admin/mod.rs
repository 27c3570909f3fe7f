//! Admin status API.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → TraceLayer (request span)
//!     → auth.rs (bearer token, when configured)
//!     → handlers.rs (read registry / trigger probes through the manager)
//! ```
//!
//! # Design Decisions
//! - Read-mostly: the only mutation is "probe now"
//! - API keys of servers are never returned

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::gateway::InferenceManager;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub manager: Arc<InferenceManager>,
    pub api_key: Option<Arc<str>>,
}

impl AdminState {
    pub fn new(manager: Arc<InferenceManager>, api_key: Option<String>) -> Self {
        Self {
            manager,
            api_key: api_key.map(Arc::from),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/servers", get(get_servers))
        .route("/admin/stats", get(get_stats))
        .route("/admin/current", get(get_current))
        .route("/admin/probe", post(probe_all))
        .route("/admin/servers/{id}/probe", post(probe_server))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve_admin(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            if shutdown.recv().await.is_err() {
                tracing::debug!("Admin shutdown channel closed");
            }
        })
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
