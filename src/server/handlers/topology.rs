use crate::server::TopologyState;
use crate::topology::HostRole;
use axum::{extract::Extension, response::Json};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct HostEntry {
    index: usize,
    host: String,
    role: &'static str,
}

#[derive(Serialize, Debug)]
pub struct RoleBuckets {
    master: Vec<usize>,
    sync_slave: Vec<usize>,
    slave: Vec<usize>,
}

#[derive(Serialize, Debug)]
pub struct TopologyResponse {
    generated_at: String,
    alive_by_rtt: Vec<usize>,
    roles: RoleBuckets,
    hosts: Vec<HostEntry>,
}

fn role_of(roles: &RoleBuckets, index: usize) -> &'static str {
    // Sync slaves are listed under slave as well, so check them first.
    if roles.sync_slave.contains(&index) {
        HostRole::SyncSlave.as_str()
    } else if roles.master.contains(&index) {
        HostRole::Master.as_str()
    } else if roles.slave.contains(&index) {
        HostRole::Slave.as_str()
    } else {
        HostRole::Unknown.as_str()
    }
}

fn build_response(state: &TopologyState) -> TopologyResponse {
    let alive = state.views.alive_by_rtt();
    let by_role = state.views.indices_by_role();
    let bucket = |role: HostRole| by_role.get(&role).cloned().unwrap_or_default();

    let roles = RoleBuckets {
        master: bucket(HostRole::Master),
        sync_slave: bucket(HostRole::SyncSlave),
        slave: bucket(HostRole::Slave),
    };

    let hosts = state
        .host_names
        .iter()
        .enumerate()
        .map(|(index, host)| HostEntry {
            index,
            host: host.clone(),
            role: role_of(&roles, index),
        })
        .collect();

    TopologyResponse {
        generated_at: chrono::Utc::now().to_rfc3339(),
        alive_by_rtt: alive.to_vec(),
        roles,
        hosts,
    }
}

/// Current topology as JSON: alive indices in RTT order, role buckets and
/// the static host list. Everything comes from the published snapshots; the
/// handler never blocks discovery.
pub async fn topology(Extension(state): Extension<TopologyState>) -> Json<TopologyResponse> {
    Json(build_response(&state))
}
