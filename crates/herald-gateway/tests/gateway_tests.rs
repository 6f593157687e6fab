// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP tests against a live ephemeral-port server.

use std::net::SocketAddr;
use std::sync::Arc;

use herald_config::model::{GatewayConfig, HeraldConfig};
use herald_core::Component;
use herald_gateway::HeraldGateway;
use herald_supervisor::{ServiceHandles, Supervisor};
use herald_test_utils::{open_test_store, MockCatalog, MockProvider};

struct Rig {
    supervisor: Supervisor,
    gateway: Arc<HeraldGateway>,
    addr: SocketAddr,
    _dir: tempfile::TempDir,
}

async fn rig(prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>) -> Rig {
    let (store, dir) = open_test_store().await;

    let mut config = HeraldConfig::default();
    config.queue.idle_poll_ms = 10;
    config.supervisor.health_interval_secs = 1;

    let handles = ServiceHandles {
        store,
        provider: Arc::new(MockProvider::new()),
        catalog: Arc::new(MockCatalog::with(["welcome"])),
    };
    let supervisor = Supervisor::new(config, handles);
    supervisor.start().await.unwrap();

    let gateway = Arc::new(HeraldGateway::new(
        GatewayConfig {
            enabled: true,
            host: "127.0.0.1".into(),
            port: 0,
        },
        supervisor.clone(),
        prometheus_render,
    ));
    let addr = gateway.start().await.unwrap();

    Rig {
        supervisor,
        gateway,
        addr,
        _dir: dir,
    }
}

async fn teardown(rig: Rig) {
    rig.gateway.shutdown().await.unwrap();
    rig.supervisor.stop().await;
}

#[tokio::test]
async fn health_returns_200_when_running() {
    let rig = rig(None).await;
    // Let the health loop publish its first snapshot.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let resp = reqwest::get(format!("http://{}/health", rig.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(
        body["status"] == "healthy" || body["status"] == "degraded",
        "body: {body}"
    );
    assert!(body["uptime_secs"].is_u64());
    assert!(body["timestamp"].is_string());

    teardown(rig).await;
}

#[tokio::test]
async fn health_returns_503_when_stopped() {
    let rig = rig(None).await;
    rig.supervisor.stop().await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // The snapshot may be stale; the detailed endpoint recomputes.
    let resp = reqwest::get(format!("http://{}/health/detailed", rig.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["state"], "stopped");

    rig.gateway.shutdown().await.unwrap();
}

#[tokio::test]
async fn detailed_health_lists_components_and_queue() {
    let rig = rig(None).await;

    let resp = reqwest::get(format!("http://{}/health/detailed", rig.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    let names: Vec<&str> = body["components"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"sqlite-store"));
    assert!(names.contains(&"delivery-queue"));
    assert!(names.contains(&"cron-scheduler"));

    assert!(body["queue"]["depth"].is_u64());
    assert!(body["version"].is_string());

    teardown(rig).await;
}

#[tokio::test]
async fn subscriptions_endpoint_reports_counts() {
    let rig = rig(None).await;

    let resp = reqwest::get(format!("http://{}/health/subscriptions", rig.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["total"], 0);
    assert_eq!(body["active"], 0);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["reconnecting"], 0);

    teardown(rig).await;
}

#[tokio::test]
async fn metrics_endpoint_renders_prometheus_text() {
    let render: Arc<dyn Fn() -> String + Send + Sync> =
        Arc::new(|| "herald_queue_depth 0\n".to_string());
    let rig = rig(Some(render)).await;

    let resp = reqwest::get(format!("http://{}/metrics", rig.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let content_type = resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = resp.text().await.unwrap();
    assert!(body.contains("herald_queue_depth"));

    teardown(rig).await;
}

#[tokio::test]
async fn metrics_endpoint_404s_when_disabled() {
    let rig = rig(None).await;

    let resp = reqwest::get(format!("http://{}/metrics", rig.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    teardown(rig).await;
}

#[tokio::test]
async fn control_surface_pauses_and_resumes() {
    let rig = rig(None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/control/pause", rig.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["paused"], true);
    assert!(rig.supervisor.is_paused());

    let resp = client
        .post(format!("http://{}/control/resume", rig.addr))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["paused"], false);

    let resp = client
        .get(format!("http://{}/control/status", rig.addr))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["state"], "running");

    teardown(rig).await;
}

#[tokio::test]
async fn control_stop_and_start_cycle_the_pipeline() {
    let rig = rig(None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/control/stop", rig.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["state"], "stopped");

    // Starting while already started conflicts; after the stop it works.
    let resp = client
        .post(format!("http://{}/control/start", rig.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["state"], "running");

    let resp = client
        .post(format!("http://{}/control/start", rig.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409, "double start is rejected");

    teardown(rig).await;
}

#[tokio::test]
async fn control_reconcile_runs() {
    let rig = rig(None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/control/reconcile", rig.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    teardown(rig).await;
}

#[tokio::test]
async fn gateway_component_health_follows_server_task() {
    let rig = rig(None).await;
    assert!(rig.gateway.health_check().await.unwrap().is_healthy());

    rig.gateway.shutdown().await.unwrap();
    let health = rig.gateway.health_check().await.unwrap();
    assert!(!health.is_healthy());

    rig.supervisor.stop().await;
}
