//! Cluster topology discovery: periodic probing of a fixed DSN list,
//! role classification and RTT ranking, published as lock-free snapshots.

use secrecy::SecretString;
use serde::Serialize;
use std::time::Duration;

pub mod discovery;
pub mod probe;
pub mod sync_names;
pub mod views;

pub use discovery::Discovery;
pub use views::{AliveByRtt, IndicesByRole, TopologyViews};

/// Deadline covering one whole probe (connect + queries).
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Cadence of the discovery loop.
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(1);

/// `application_name` set on probe connections so they are identifiable in
/// `pg_stat_activity` and server logs.
pub const PROBE_APPLICATION_NAME: &str = "pg_topology_probe";

/// Name of the periodic discovery task in logs and traces.
pub const DISCOVERY_TASK_NAME: &str = "topology_discovery";

/// Role a host was observed in during the last discovery cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostRole {
    /// Unreachable or not probed yet.
    Unknown,
    /// Primary, accepts writes.
    Master,
    /// Asynchronous replica.
    Slave,
    /// Replica listed in the master's `synchronous_standby_names`.
    SyncSlave,
}

impl HostRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Master => "master",
            Self::Slave => "slave",
            Self::SyncSlave => "sync_slave",
        }
    }
}

/// Discovery parameters. DSN order is significant: hosts are referred to by
/// their position in this list everywhere else.
#[derive(Debug)]
pub struct Settings {
    pub dsns: Vec<SecretString>,
    pub probe_timeout: Duration,
    pub discovery_interval: Duration,
}

impl Settings {
    #[must_use]
    pub fn new(dsns: Vec<SecretString>) -> Self {
        Self {
            dsns,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
        }
    }

    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }
}
