use crate::server::TopologyState;
use crate::topology::HostRole;
use anyhow::Result;
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use prometheus::{IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use tracing::error;

/// The role a host currently carries per the published buckets. Sync slaves
/// are listed under slave as well, so check them first.
fn host_role(by_role: &HashMap<HostRole, Vec<usize>>, index: usize) -> HostRole {
    for role in [HostRole::SyncSlave, HostRole::Master, HostRole::Slave] {
        if by_role
            .get(&role)
            .is_some_and(|bucket| bucket.contains(&index))
        {
            return role;
        }
    }
    HostRole::Unknown
}

/// Renders the published views as Prometheus text. Gauges are rebuilt per
/// scrape, so a host that disappears from the views disappears from the
/// labels as well instead of going stale.
fn render(state: &TopologyState) -> Result<String> {
    let registry = Registry::new();

    let alive = IntGauge::new(
        "pg_topology_alive_hosts",
        "Hosts that answered the last probe cycle",
    )?;
    let by_role = IntGaugeVec::new(
        Opts::new(
            "pg_topology_hosts",
            "Hosts per role; slave includes sync_slave",
        ),
        &["role"],
    )?;
    let host_up = IntGaugeVec::new(
        Opts::new(
            "pg_topology_host_up",
            "1 when the host answered the last probe cycle",
        ),
        &["host"],
    )?;
    let host_role_gauge = IntGaugeVec::new(
        Opts::new(
            "pg_topology_host_role",
            "1 for the host's current role, 0 otherwise",
        ),
        &["host", "role"],
    )?;

    registry.register(Box::new(alive.clone()))?;
    registry.register(Box::new(by_role.clone()))?;
    registry.register(Box::new(host_up.clone()))?;
    registry.register(Box::new(host_role_gauge.clone()))?;

    let alive_indices = state.views.alive_by_rtt();
    let roles = state.views.indices_by_role();

    alive.set(alive_indices.len() as i64);

    for role in [HostRole::Master, HostRole::SyncSlave, HostRole::Slave] {
        let count = roles.get(&role).map_or(0, Vec::len);
        by_role
            .with_label_values(&[role.as_str()])
            .set(count as i64);
    }

    for (index, host) in state.host_names.iter().enumerate() {
        let up = i64::from(alive_indices.contains(&index));
        host_up.with_label_values(&[host.as_str()]).set(up);

        let current = host_role(&roles, index);
        for role in [
            HostRole::Unknown,
            HostRole::Master,
            HostRole::SyncSlave,
            HostRole::Slave,
        ] {
            host_role_gauge
                .with_label_values(&[host.as_str(), role.as_str()])
                .set(i64::from(role == current));
        }
    }

    Ok(TextEncoder::new().encode_to_string(&registry.gather())?)
}

pub async fn metrics(Extension(state): Extension<TopologyState>) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        "content-type",
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );

    match render(&state) {
        Ok(body) => (StatusCode::OK, headers, body),
        Err(error) => {
            error!(%error, "failed to render topology metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                headers,
                format!("Error rendering metrics: {error}"),
            )
        }
    }
}
