use crate::server::{GIT_COMMIT_HASH, TopologyState};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<String>,
    name: String,
    version: String,
    cluster: String,
    alive_hosts: usize,
}

fn build_health(alive_hosts: usize) -> Health {
    Health {
        commit: GIT_COMMIT_HASH.map(String::from),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cluster: if alive_hosts > 0 { "ok" } else { "unreachable" }.to_string(),
        alive_hosts,
    }
}

// X-App: name:version[:shorthash]
fn app_headers(health: &Health) -> HeaderMap {
    let short_hash = health
        .commit
        .as_deref()
        .filter(|s| s.len() > 7)
        .map(|s| s.get(0..7).unwrap_or(""))
        .unwrap_or("");

    let header_value = if short_hash.is_empty() {
        format!("{}:{}", health.name, health.version)
    } else {
        format!("{}:{}:{}", health.name, health.version, short_hash)
    };

    let mut headers = HeaderMap::new();
    match header_value.parse::<HeaderValue>() {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(error) => {
            debug!(%error, "failed to build X-App header");
        }
    }
    headers
}

/// Health of the discoverer as seen from its views: `200` while at least one
/// host is alive, `503` when the whole cluster is unreachable. OPTIONS gets
/// the status and headers without a body.
pub async fn health(
    method: Method,
    Extension(state): Extension<TopologyState>,
) -> impl IntoResponse {
    let alive_hosts = state.views.alive_by_rtt().len();
    let health = build_health(alive_hosts);
    let headers = app_headers(&health);

    let body = if method == Method::GET {
        Json(&health).into_response().into_body()
    } else {
        Body::empty()
    };

    let status = if alive_hosts > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, headers, body)
}
