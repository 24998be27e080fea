//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Monitoring, alert and event routes return correct responses
//! - Coordinator errors map to the right status codes
//! - Authentication middleware functions properly

use std::net::SocketAddr;
use std::sync::Arc;

use api_sentinel::api::{ApiConfig, ApiState, spawn_api_server};
use api_sentinel::storage::schema::EndpointId;
use api_sentinel::storage::MemoryBackend;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::helpers::*;

const TOKEN: &str = "test-token";

struct TestApi {
    addr: SocketAddr,
    storage: Arc<MemoryBackend>,
    transport: Arc<FakeTransport>,
    client: reqwest::Client,
}

impl TestApi {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(TOKEN)
            .send()
            .await
            .unwrap()
    }

    async fn post(&self, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(TOKEN)
            .send()
            .await
            .unwrap()
    }

    async fn register(&self, path: &str) -> EndpointId {
        register(self.storage.as_ref(), "users", path).await
    }
}

// Helper to create test API server
async fn spawn_test_api() -> TestApi {
    let storage = Arc::new(MemoryBackend::new());
    let transport = Arc::new(FakeTransport::new(ok_after(200, 120)));
    let coordinator = Arc::new(coordinator(storage.clone(), transport.clone()));

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        auth_token: Some(TOKEN.to_string()),
        enable_cors: true,
    };

    let addr = spawn_api_server(config, ApiState::new(coordinator))
        .await
        .unwrap();

    TestApi {
        addr,
        storage,
        transport,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let api = spawn_test_api().await;

    let response = api.get("/api/v1/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage_healthy"], true);
    assert_eq!(body["monitoring_running"], false);
}

#[tokio::test]
async fn test_run_without_endpoints() {
    let api = spawn_test_api().await;

    let response = api.post("/api/v1/monitoring/run").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "No active endpoints to monitor");
}

#[tokio::test]
async fn test_run_and_read_results() {
    let api = spawn_test_api().await;
    let id = api.register("/users").await;

    let body: Value = api.post("/api/v1/monitoring/run").await.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["total"], 1);
    assert_eq!(body["successful"], 1);
    assert_eq!(body["message"], "Monitoring completed: 1 successful, 0 failed");

    let response = api.get(&format!("/api/v1/monitoring/results/{id}?limit=5")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["endpoint"]["path"], "/users");
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["results"][0]["status_code"], 200);

    let stats: Value = api.get("/api/v1/monitoring/stats").await.json().await.unwrap();
    assert_eq!(stats["total_checks"], 1);
    assert_eq!(stats["availability"], 100.0);
    assert_eq!(stats["avg_response_time_ms"], 120.0);
}

#[tokio::test]
async fn test_test_endpoint() {
    let api = spawn_test_api().await;
    let id = api.register("/users").await;

    let response = api.post(&format!("/api/v1/monitoring/test/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["endpoint_id"], id);
    assert_eq!(api.transport.calls(), 1);

    let response = api.post("/api/v1/monitoring/test/9999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_configure_endpoint() {
    let api = spawn_test_api().await;
    let id = api.register("/users").await;

    let response = api
        .client
        .put(api.url(&format!("/api/v1/monitoring/config/{id}")))
        .bearer_auth(TOKEN)
        .json(&json!({"latency_threshold_ms": 50.0, "check_interval_seconds": 60}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["config"]["latency_threshold_ms"], 50.0);
    assert_eq!(body["config"]["timeout_seconds"], 30);

    let response = api
        .client
        .put(api.url(&format!("/api/v1/monitoring/config/{id}")))
        .bearer_auth(TOKEN)
        .json(&json!({"timeout_seconds": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = api
        .client
        .put(api.url(&format!("/api/v1/monitoring/config/{id}")))
        .bearer_auth(TOKEN)
        .json(&json!({"interval": 60}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_stats_rejects_invalid_window() {
    let api = spawn_test_api().await;

    let response = api.get("/api/v1/monitoring/stats?hours=0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = api
        .get(&format!("/api/v1/monitoring/stats?hours={}", i64::MAX))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = api.get("/api/v1/monitoring/stats?hours=1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats: Value = response.json().await.unwrap();
    assert_eq!(stats["total_checks"], 0);
    assert_eq!(stats["availability"], 0.0);
}

#[tokio::test]
async fn test_alert_routes() {
    let api = spawn_test_api().await;
    let id = api.register("/users").await;
    api.transport.respond(&url("/users"), ok_after(200, 2500));

    api.post("/api/v1/monitoring/run").await;

    let body: Value = api
        .get(&format!("/api/v1/alerts?endpoint_id={id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["alerts"][0]["alert_type"], "HIGH_LATENCY");
    assert_eq!(body["alerts"][0]["severity"], "warning");
    let alert_id = body["alerts"][0]["id"].as_i64().unwrap();

    let body: Value = api
        .post(&format!("/api/v1/alerts/{alert_id}/resolve"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);

    let body: Value = api
        .post(&format!("/api/v1/alerts/{alert_id}/resolve"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], false);

    api.post("/api/v1/monitoring/run").await;
    api.post("/api/v1/monitoring/run").await;
    let body: Value = api
        .post("/api/v1/alerts/resolve-all")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["resolved"], 2);

    let body: Value = api.get("/api/v1/alerts").await.json().await.unwrap();
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_events_route() {
    let api = spawn_test_api().await;
    api.register("/users").await;
    api.post("/api/v1/monitoring/run").await;

    let body: Value = api
        .get("/api/v1/events?event_type=monitoring&limit=5")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["events"][0]["event_type"], "MONITORING");

    let response = api.get("/api/v1/events?event_type=bogus").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_with_invalid_token_fails_403() {
    let api = spawn_test_api().await;

    let response = api
        .client
        .get(api.url("/api/v1/health"))
        .bearer_auth("wrong-token")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_api_without_token_when_required_fails_401() {
    let api = spawn_test_api().await;

    let response = api
        .client
        .get(api.url("/api/v1/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
