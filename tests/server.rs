#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::indexing_slicing)]

use anyhow::Result;
use pg_topology::server;
use pg_topology::topology::{Discovery, Settings};
use serde_json::Value;

mod common;

// An empty DSN list is the smallest real deployment surface: the server must
// come up, answer every route and report the cluster as unreachable.
async fn spawn_empty_cluster_server() -> Result<(u16, tokio::task::JoinHandle<Result<()>>)> {
    let port = common::get_available_port();
    let discovery = Discovery::connect(Settings::new(Vec::new())).await?;

    let handle = tokio::spawn(async move {
        let discovery = discovery;
        server::new(port, Some("127.0.0.1".to_string()), &discovery).await
    });

    assert!(
        common::wait_for_server(port, 50).await,
        "Server failed to start"
    );

    Ok((port, handle))
}

#[tokio::test]
async fn test_health_reports_unreachable_cluster() -> Result<()> {
    let (port, handle) = spawn_empty_cluster_server().await?;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", common::get_test_url(port)))
        .send()
        .await?;

    assert_eq!(response.status(), 503);

    let body: Value = response.json().await?;
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["cluster"], "unreachable");
    assert_eq!(body["alive_hosts"], 0);

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_health_has_x_app_header_and_empty_options_body() -> Result<()> {
    let (port, handle) = spawn_empty_cluster_server().await?;

    let client = reqwest::Client::new();
    let response = client
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/health", common::get_test_url(port)),
        )
        .send()
        .await?;

    let x_app = response
        .headers()
        .get("X-App")
        .expect("X-App header should be present");
    let x_app_str = x_app.to_str()?;
    assert!(x_app_str.contains(env!("CARGO_PKG_NAME")));
    assert!(x_app_str.contains(env!("CARGO_PKG_VERSION")));

    let body = response.text().await?;
    assert!(body.is_empty(), "OPTIONS must not carry a body");

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_topology_endpoint_empty_cluster() -> Result<()> {
    let (port, handle) = spawn_empty_cluster_server().await?;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/topology", common::get_test_url(port)))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    let body: Value = response.json().await?;
    assert_eq!(body["alive_by_rtt"], Value::Array(Vec::new()));
    assert_eq!(body["hosts"], Value::Array(Vec::new()));
    assert_eq!(body["roles"]["master"], Value::Array(Vec::new()));
    assert_eq!(body["roles"]["sync_slave"], Value::Array(Vec::new()));
    assert_eq!(body["roles"]["slave"], Value::Array(Vec::new()));
    assert!(body["generated_at"].is_string());

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_empty_cluster() -> Result<()> {
    let (port, handle) = spawn_empty_cluster_server().await?;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/metrics", common::get_test_url(port)))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    let body = response.text().await?;
    assert!(body.contains("pg_topology_alive_hosts 0"));
    assert!(body.contains("pg_topology_hosts{role=\"master\"} 0"));

    handle.abort();

    Ok(())
}

#[tokio::test]
async fn test_requests_get_a_request_id() -> Result<()> {
    let (port, handle) = spawn_empty_cluster_server().await?;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/topology", common::get_test_url(port)))
        .header("x-request-id", "test-id-123")
        .send()
        .await?;

    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("test-id-123")
    );

    handle.abort();

    Ok(())
}
