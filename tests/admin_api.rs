//! Admin API tests driven through the router with `oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use inference_router::admin::{setup_admin_router, AdminState};
use inference_router::config::RouterConfig;
use inference_router::gateway::InferenceManager;
use inference_router::registry::{ServerConfig, ServerStatus};
use tower::ServiceExt;

mod common;
use common::{start_mock, Behavior};

fn manager(servers: Vec<ServerConfig>) -> Arc<InferenceManager> {
    let mut config = RouterConfig::default();
    config.servers = servers;
    config.fallback.chain = vec!["b".into()];
    Arc::new(InferenceManager::new(&config).unwrap())
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_requires_bearer_token_when_configured() {
    let app = setup_admin_router(AdminState::new(manager(vec![]), Some("secret".into())));

    let res = app.clone().oneshot(get("/admin/status", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app.clone().oneshot(get("/admin/status", Some("wrong"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app.oneshot(get("/admin/status", Some("secret"))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json(res).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["fallbackChain"][0], "b");
}

#[tokio::test]
async fn test_servers_and_stats() {
    let a = ServerConfig::new("a", "http://a.local/v1", "m")
        .with_priority(1)
        .with_api_key("do-not-leak");
    let b = ServerConfig::new("b", "http://b.local/v1", "m").with_priority(2);
    let manager = manager(vec![a.clone(), b]);
    manager.registry().set_status(ServerStatus::healthy(&a, 42));

    let app = setup_admin_router(AdminState::new(manager, None));

    let res = app.clone().oneshot(get("/admin/servers", None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let raw = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!raw.contains("do-not-leak"));

    let servers: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(servers[0]["id"], "a");
    assert_eq!(servers[0]["hasApiKey"], true);
    assert_eq!(servers[0]["status"]["responseTimeMs"], 42);
    assert!(servers[1]["status"].is_null());

    let res = app.oneshot(get("/admin/stats", None)).await.unwrap();
    let stats = json(res).await;
    assert_eq!(stats["totalServers"], 2);
    assert_eq!(stats["healthyServers"], 1);
    assert_eq!(stats["avgResponseMs"], 42);
}

#[tokio::test]
async fn test_probe_endpoints() {
    let mock = start_mock(Behavior::status(200)).await;
    let manager = manager(vec![mock.server("a", 1)]);
    let app = setup_admin_router(AdminState::new(manager.clone(), None));

    let probe_all = Request::builder()
        .method("POST")
        .uri("/admin/probe")
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(probe_all).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let statuses = json(res).await;
    assert_eq!(statuses[0]["isHealthy"], true);
    assert!(manager.registry().status("a").unwrap().is_healthy);

    let missing = Request::builder()
        .method("POST")
        .uri("/admin/servers/ghost/probe")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(missing).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_current_target_reports_health() {
    let a = ServerConfig::new("a", "http://a.local/v1", "m").with_priority(1);
    let manager = manager(vec![a.clone()]);
    let app = setup_admin_router(AdminState::new(Arc::clone(&manager), None));

    let body = json(app.clone().oneshot(get("/admin/current", None)).await.unwrap()).await;
    assert_eq!(body["status"], "unknown");
    assert!(body["target"].is_null());

    manager.registry().set_status(ServerStatus::healthy(&a, 7));
    let body = json(app.oneshot(get("/admin/current", None)).await.unwrap()).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["target"]["serverId"], "a");
    assert!(body["target"].get("apiKey").is_none());
}
