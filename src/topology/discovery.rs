//! The discovery loop: fan out probes, aggregate, publish, repeat.

use crate::topology::probe::HostProbe;
use crate::topology::views::{self, TopologyViews, ViewPublisher};
use crate::topology::{DISCOVERY_TASK_NAME, HostRole, Settings};
use anyhow::{Context, Result};
use futures::future::join_all;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgConnectOptions;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Handle to a running topology discoverer.
///
/// Construction probes every host once before returning, so the views are
/// already a completed cycle's output by the time anything reads them. A
/// background worker then repeats the cycle at the configured interval until
/// [`Discovery::stop`] is called.
pub struct Discovery {
    dsns: Arc<[SecretString]>,
    host_names: Arc<[String]>,
    views: TopologyViews,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl Discovery {
    /// Parses every DSN, runs the initial discovery cycle and starts the
    /// periodic worker.
    ///
    /// # Errors
    ///
    /// Returns an error if any DSN fails to parse. Unreachable hosts are not
    /// an error at any point: they show up as absent from the views.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let mut probes = Vec::with_capacity(settings.dsns.len());
        for (index, dsn) in settings.dsns.iter().enumerate() {
            let options = PgConnectOptions::from_str(dsn.expose_secret())
                .with_context(|| format!("invalid DSN at index {index}"))?;
            probes.push(HostProbe::new(options));
        }
        let host_names: Arc<[String]> = probes
            .iter()
            .map(|probe| probe.app_name().to_string())
            .collect();

        info!(
            task = DISCOVERY_TASK_NAME,
            hosts = probes.len(),
            "starting topology discovery"
        );

        let (publisher, views) = views::channel();
        run_cycle(&mut probes, &publisher, settings.probe_timeout).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(run_worker(
            probes,
            publisher,
            settings.probe_timeout,
            settings.discovery_interval,
            shutdown_rx,
        ));

        Ok(Self {
            dsns: settings.dsns.into(),
            host_names,
            views,
            shutdown_tx,
            worker,
        })
    }

    /// The DSN list the discoverer was built with. Stable for its lifetime;
    /// views refer to hosts by their position here.
    #[must_use]
    pub fn dsn_list(&self) -> &[SecretString] {
        &self.dsns
    }

    /// Escaped host names, one per DSN index.
    #[must_use]
    pub fn host_names(&self) -> Arc<[String]> {
        Arc::clone(&self.host_names)
    }

    /// A cloneable reader for the published views.
    #[must_use]
    pub fn views(&self) -> TopologyViews {
        self.views.clone()
    }

    /// Stops the periodic worker, waits for any in-flight cycle and closes
    /// every probe connection.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(error) = self.worker.await {
            warn!(%error, "discovery worker terminated abnormally");
        }
        info!(task = DISCOVERY_TASK_NAME, "topology discovery stopped");
    }
}

async fn run_worker(
    mut probes: Vec<HostProbe>,
    publisher: ViewPublisher,
    probe_timeout: Duration,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // The initial cycle already ran in the constructor; the first tick lands
    // a full interval later. Burst mode keeps one tick per interval under
    // load: a slow cycle delays the next, it never swallows it.
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_cycle(&mut probes, &publisher, probe_timeout).await;
            }
            _ = shutdown_rx.changed() => break,
        }
    }

    // Teardown: probe connections are closed before the worker exits so
    // nothing leaks into a runtime that is shutting down.
    for probe in &mut probes {
        probe.close().await;
    }
}

/// One full cycle: probe every host concurrently, aggregate, publish. Always
/// publishes, even when every host is down.
async fn run_cycle(probes: &mut [HostProbe], publisher: &ViewPublisher, probe_timeout: Duration) {
    join_all(
        probes
            .iter_mut()
            .map(|probe| probe.run_check(probe_timeout)),
    )
    .await;

    let (alive, by_role) = aggregate(probes);
    debug!(
        alive = alive.len(),
        masters = by_role.get(&HostRole::Master).map_or(0, Vec::len),
        sync_slaves = by_role.get(&HostRole::SyncSlave).map_or(0, Vec::len),
        "discovery cycle complete"
    );
    publisher.publish(alive, by_role);
}

type CycleOutcome = (Vec<usize>, HashMap<HostRole, Vec<usize>>);

/// Post-processing after the join: sync-slave promotion, RTT ordering and
/// role bucketing. Pure with respect to I/O, so the rules are testable
/// without a cluster.
fn aggregate(probes: &mut [HostProbe]) -> CycleOutcome {
    let mut alive: Vec<usize> = probes
        .iter()
        .enumerate()
        .filter(|(_, probe)| probe.role() != HostRole::Unknown)
        .map(|(index, _)| index)
        .collect();

    promote_sync_standbys(probes, &alive);

    // Stable sort: RTT ties keep index order.
    alive.sort_by_key(|&index| probes.get(index).and_then(HostProbe::rtt));

    let mut by_role: HashMap<HostRole, Vec<usize>> = HashMap::new();
    for &index in &alive {
        let Some(probe) = probes.get(index) else {
            continue;
        };
        by_role.entry(probe.role()).or_default().push(index);
        if probe.role() == HostRole::SyncSlave {
            by_role.entry(HostRole::Slave).or_default().push(index);
        }
    }

    (alive, by_role)
}

/// A replica only counts as synchronous when exactly one master was observed
/// this cycle and that master lists the replica's `application_name`. The
/// scan is quadratic in `alive × names`, fine at cluster scale.
fn promote_sync_standbys(probes: &mut [HostProbe], alive: &[usize]) {
    let mut masters = alive
        .iter()
        .copied()
        .filter(|&index| probes.get(index).is_some_and(|p| p.role() == HostRole::Master));
    let Some(master) = masters.next() else {
        return;
    };
    if masters.next().is_some() {
        debug!("multiple masters observed, skipping sync-standby promotion");
        return;
    }

    let sync_names = probes
        .get(master)
        .map(|probe| probe.sync_standbys().to_vec())
        .unwrap_or_default();

    for name in &sync_names {
        for &index in alive {
            let Some(probe) = probes.get_mut(index) else {
                continue;
            };
            if probe.role() == HostRole::Slave && probe.app_name().eq_ignore_ascii_case(name) {
                probe.promote_to_sync();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(host: &str, role: HostRole, rtt_ms: Option<u64>, sync: &[&str]) -> HostProbe {
        let mut probe = HostProbe::new(PgConnectOptions::new().host(host));
        probe.force_observation(
            role,
            rtt_ms.map(Duration::from_millis),
            sync.iter().map(|s| (*s).to_string()).collect(),
        );
        probe
    }

    #[test]
    fn test_aggregate_classifies_and_orders_by_rtt() {
        // master at 3ms listing replica1 as sync, replica1 at 5ms, replica2
        // async at 2ms.
        let mut probes = vec![
            probe("master", HostRole::Master, Some(3), &["replica1"]),
            probe("replica1", HostRole::Slave, Some(5), &[]),
            probe("replica2", HostRole::Slave, Some(2), &[]),
        ];

        let (alive, by_role) = aggregate(&mut probes);

        assert_eq!(alive, vec![2, 0, 1]);
        assert_eq!(by_role.get(&HostRole::Master), Some(&vec![0]));
        assert_eq!(by_role.get(&HostRole::SyncSlave), Some(&vec![1]));
        // The sync slave stays a valid replica-read target, appended after
        // the async replica because RTT order is preserved.
        assert_eq!(by_role.get(&HostRole::Slave), Some(&vec![2, 1]));
    }

    #[test]
    fn test_aggregate_skips_unreachable_hosts() {
        let mut probes = vec![
            probe("master", HostRole::Master, Some(3), &[]),
            probe("gone", HostRole::Unknown, None, &[]),
        ];

        let (alive, by_role) = aggregate(&mut probes);

        assert_eq!(alive, vec![0]);
        assert!(by_role.get(&HostRole::Slave).is_none());
    }

    #[test]
    fn test_aggregate_all_hosts_down() {
        let mut probes = vec![
            probe("a", HostRole::Unknown, None, &[]),
            probe("b", HostRole::Unknown, None, &[]),
        ];

        let (alive, by_role) = aggregate(&mut probes);

        assert!(alive.is_empty());
        assert!(by_role.is_empty());
    }

    #[test]
    fn test_aggregate_no_probes() {
        let (alive, by_role) = aggregate(&mut []);
        assert!(alive.is_empty());
        assert!(by_role.is_empty());
    }

    #[test]
    fn test_sync_match_is_case_insensitive() {
        let mut probes = vec![
            probe("master", HostRole::Master, Some(1), &["REPLICA1"]),
            probe("replica1", HostRole::Slave, Some(2), &[]),
        ];

        let (_, by_role) = aggregate(&mut probes);

        assert_eq!(by_role.get(&HostRole::SyncSlave), Some(&vec![1]));
    }

    #[test]
    fn test_sync_names_not_matching_any_host() {
        let mut probes = vec![
            probe("master", HostRole::Master, Some(1), &["elsewhere"]),
            probe("replica1", HostRole::Slave, Some(2), &[]),
        ];

        let (_, by_role) = aggregate(&mut probes);

        assert!(by_role.get(&HostRole::SyncSlave).is_none());
        assert_eq!(by_role.get(&HostRole::Slave), Some(&vec![1]));
    }

    #[test]
    fn test_multiple_masters_published_without_promotion() {
        let mut probes = vec![
            probe("m1", HostRole::Master, Some(1), &["replica1"]),
            probe("m2", HostRole::Master, Some(2), &["replica1"]),
            probe("replica1", HostRole::Slave, Some(3), &[]),
        ];

        let (alive, by_role) = aggregate(&mut probes);

        assert_eq!(alive, vec![0, 1, 2]);
        assert_eq!(by_role.get(&HostRole::Master), Some(&vec![0, 1]));
        assert!(by_role.get(&HostRole::SyncSlave).is_none());
    }

    #[test]
    fn test_rtt_ties_keep_index_order() {
        let mut probes = vec![
            probe("a", HostRole::Slave, Some(2), &[]),
            probe("b", HostRole::Slave, Some(2), &[]),
            probe("c", HostRole::Slave, Some(1), &[]),
        ];

        let (alive, _) = aggregate(&mut probes);

        assert_eq!(alive, vec![2, 0, 1]);
    }

    #[test]
    fn test_back_to_back_aggregation_is_stable() {
        let mut probes = vec![
            probe("master", HostRole::Master, Some(3), &["replica1"]),
            probe("replica1", HostRole::Slave, Some(5), &[]),
        ];

        let first = aggregate(&mut probes);
        // Second cycle on an unchanged cluster: replica1 is already promoted,
        // which must not change the outcome.
        let second = aggregate(&mut probes);

        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_dsn() {
        let settings = Settings::new(vec![SecretString::from("not a dsn at all ://".to_string())]);
        assert!(Discovery::connect(settings).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_with_no_hosts_publishes_empty_views() {
        let discovery = match Discovery::connect(Settings::new(Vec::new())).await {
            Ok(discovery) => discovery,
            Err(error) => panic!("connect with zero DSNs failed: {error}"),
        };

        let views = discovery.views();
        assert!(views.alive_by_rtt().is_empty());
        assert!(views.indices_by_role().is_empty());
        assert!(discovery.dsn_list().is_empty());
        assert!(discovery.host_names().is_empty());

        discovery.stop().await;
    }
}
