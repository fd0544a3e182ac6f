//! Per-host probe: one dedicated connection, one read-only check per cycle.

use crate::topology::{HostRole, PROBE_APPLICATION_NAME, sync_names};
use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Replicas answer `true`, primaries `false`. The round trip of this query
/// is the host's RTT sample for the cycle.
const READ_ONLY_CHECK_SQL: &str = "SELECT pg_is_in_recovery()";

const SYNC_STANDBY_NAMES_SQL: &str = "SHOW synchronous_standby_names";

/// Probe state for a single DSN. Owned exclusively by the discovery worker;
/// the connection is never shared with client traffic.
pub(crate) struct HostProbe {
    app_name: String,
    options: PgConnectOptions,
    connection: Option<PgConnection>,
    role: HostRole,
    rtt: Option<Duration>,
    sync_standbys: Vec<String>,
}

/// Escapes a host name the way replicas derive their `application_name`
/// from it: every byte outside `[A-Za-z0-9_]` becomes `_`, so the value
/// matches `pg_stat_replication.application_name`.
fn escape_host_name(host: &str) -> String {
    host.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

impl HostProbe {
    pub(crate) fn new(options: PgConnectOptions) -> Self {
        let app_name = escape_host_name(options.get_host());
        Self {
            app_name,
            options: options.application_name(PROBE_APPLICATION_NAME),
            connection: None,
            role: HostRole::Unknown,
            rtt: None,
            sync_standbys: Vec::new(),
        }
    }

    pub(crate) fn app_name(&self) -> &str {
        &self.app_name
    }

    pub(crate) const fn role(&self) -> HostRole {
        self.role
    }

    pub(crate) const fn rtt(&self) -> Option<Duration> {
        self.rtt
    }

    pub(crate) fn sync_standbys(&self) -> &[String] {
        &self.sync_standbys
    }

    pub(crate) const fn promote_to_sync(&mut self) {
        self.role = HostRole::SyncSlave;
    }

    /// Probes the host once. `timeout` covers the whole probe: connect (when
    /// no connection is retained from the previous cycle), the read-only
    /// check and, on masters, the standby-names query. Every failure path
    /// resets the state tuple and drops the connection so the next cycle
    /// reconnects from scratch; failures never propagate.
    pub(crate) async fn run_check(&mut self, timeout: Duration) {
        match tokio::time::timeout(timeout, self.check()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(host = %self.app_name, %error, "probe failed");
                self.reset().await;
            }
            Err(_) => {
                warn!(host = %self.app_name, ?timeout, "probe timed out");
                self.reset().await;
            }
        }
    }

    async fn check(&mut self) -> Result<()> {
        // The connection is taken out of the slot while in use: if any query
        // fails, it is dropped as possibly broken instead of being put back.
        let mut conn = match self.connection.take() {
            Some(conn) => conn,
            None => {
                debug!(host = %self.app_name, "opening probe connection");
                self.options.connect().await?
            }
        };

        let started = Instant::now();
        let in_recovery: bool = sqlx::query_scalar(READ_ONLY_CHECK_SQL)
            .fetch_one(&mut conn)
            .await?;
        let rtt = started.elapsed();

        self.sync_standbys.clear();
        if in_recovery {
            self.role = HostRole::Slave;
        } else {
            self.role = HostRole::Master;
            let raw: String = sqlx::query_scalar(SYNC_STANDBY_NAMES_SQL)
                .fetch_one(&mut conn)
                .await?;
            self.sync_standbys = sync_names::parse(&raw);
        }
        self.rtt = Some(rtt);
        self.connection = Some(conn);

        debug!(
            host = %self.app_name,
            role = self.role.as_str(),
            rtt_us = rtt.as_micros() as u64,
            "probe ok"
        );

        Ok(())
    }

    /// Back to the unknown tuple: no role, no RTT, no standby names, no
    /// connection.
    async fn reset(&mut self) {
        self.role = HostRole::Unknown;
        self.rtt = None;
        self.sync_standbys.clear();
        self.close().await;
    }

    pub(crate) async fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            if let Err(error) = conn.close().await {
                debug!(host = %self.app_name, %error, "error closing probe connection");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn force_observation(
        &mut self,
        role: HostRole,
        rtt: Option<Duration>,
        sync_standbys: Vec<String>,
    ) {
        self.role = role;
        self.rtt = rtt;
        self.sync_standbys = sync_standbys;
    }
}
