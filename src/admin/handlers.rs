use std::collections::BTreeSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::gateway::TargetInfo;
use crate::registry::{RegistryStats, ServerConfig, ServerStatus};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    /// `operational` with at least one healthy server, else `degraded`.
    pub status: &'static str,
    pub health_checks_running: bool,
    pub probe_interval_secs: u64,
    pub active_streams: usize,
    pub fallback_chain: Vec<String>,
}

/// Server config without secrets, plus its last status.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerView {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub priority: i32,
    pub is_active: bool,
    pub capabilities: BTreeSet<String>,
    pub max_tokens: Option<u32>,
    pub description: Option<String>,
    pub has_api_key: bool,
    pub status: Option<ServerStatus>,
}

impl ServerView {
    fn new(server: ServerConfig, status: Option<ServerStatus>) -> Self {
        Self {
            has_api_key: server.api_key.is_some(),
            id: server.id,
            name: server.name,
            base_url: server.base_url,
            model: server.model,
            priority: server.priority,
            is_active: server.is_active,
            capabilities: server.capabilities,
            max_tokens: server.max_tokens,
            description: server.description,
            status,
        }
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let manager = &state.manager;
    let healthy = !manager.registry().list_healthy().is_empty();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if healthy { "operational" } else { "degraded" },
        health_checks_running: manager.scheduler().is_running(),
        probe_interval_secs: manager.probe_interval().as_secs(),
        active_streams: manager.client().active_stream_count(),
        fallback_chain: manager.selector().fallback_chain(),
    })
}

pub async fn get_servers(State(state): State<AdminState>) -> Json<Vec<ServerView>> {
    let views = state
        .manager
        .registry()
        .snapshot()
        .into_iter()
        .map(|(server, status)| ServerView::new(server, status))
        .collect();
    Json(views)
}

pub async fn get_stats(State(state): State<AdminState>) -> Json<RegistryStats> {
    Json(state.manager.registry().stats())
}

pub async fn get_current(State(state): State<AdminState>) -> Json<TargetInfo> {
    Json(state.manager.current_target_info())
}

pub async fn probe_all(State(state): State<AdminState>) -> Json<Vec<ServerStatus>> {
    Json(state.manager.scheduler().probe_all().await)
}

pub async fn probe_server(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<ServerStatus>, StatusCode> {
    state
        .manager
        .scheduler()
        .probe_server(&id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
