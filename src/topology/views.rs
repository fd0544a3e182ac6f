//! Published topology snapshots.
//!
//! Two independent variables, each a watch channel carrying an immutable
//! `Arc` payload. Readers clone the current `Arc` out of the borrow guard:
//! the clone is a stable snapshot that stays valid across await points no
//! matter how many publications happen afterwards. Writers replace the
//! payload without waiting on readers. The two variables are replaced
//! sequentially, so a reader polling both may pair the new alive list with
//! the previous role map for one cycle.

use crate::topology::HostRole;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// DSN indices of hosts alive in the last cycle, ascending RTT.
pub type AliveByRtt = Arc<[usize]>;

/// DSN indices per observed role, RTT order inside each bucket. Hosts with
/// the sync-slave role appear in the slave bucket too: a synchronous replica
/// is still a valid target for replica reads.
pub type IndicesByRole = Arc<HashMap<HostRole, Vec<usize>>>;

/// Write half, owned by the discovery worker.
pub(crate) struct ViewPublisher {
    alive_tx: watch::Sender<AliveByRtt>,
    roles_tx: watch::Sender<IndicesByRole>,
}

/// Read half, freely cloneable across tasks.
#[derive(Clone)]
pub struct TopologyViews {
    alive_rx: watch::Receiver<AliveByRtt>,
    roles_rx: watch::Receiver<IndicesByRole>,
}

/// Both views start empty; the discovery constructor publishes a completed
/// cycle before handing out any reader.
pub(crate) fn channel() -> (ViewPublisher, TopologyViews) {
    let (alive_tx, alive_rx) = watch::channel(AliveByRtt::from(Vec::new()));
    let (roles_tx, roles_rx) = watch::channel(IndicesByRole::default());
    (
        ViewPublisher { alive_tx, roles_tx },
        TopologyViews { alive_rx, roles_rx },
    )
}

impl ViewPublisher {
    /// Replaces both snapshots, alive list first. Each replacement is atomic
    /// on its own; previous snapshots live on until their last reader drops
    /// them.
    pub(crate) fn publish(&self, alive: Vec<usize>, by_role: HashMap<HostRole, Vec<usize>>) {
        self.alive_tx.send_replace(alive.into());
        self.roles_tx.send_replace(Arc::new(by_role));
    }
}

impl TopologyViews {
    /// Snapshot of the alive hosts ordered by ascending RTT.
    #[must_use]
    pub fn alive_by_rtt(&self) -> AliveByRtt {
        self.alive_rx.borrow().clone()
    }

    /// Snapshot of the role buckets.
    #[must_use]
    pub fn indices_by_role(&self) -> IndicesByRole {
        self.roles_rx.borrow().clone()
    }

    /// Indices currently carrying `role`, RTT order.
    #[must_use]
    pub fn indices_for_role(&self, role: HostRole) -> Vec<usize> {
        self.roles_rx
            .borrow()
            .get(&role)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_start_empty() {
        let (_publisher, views) = channel();
        assert!(views.alive_by_rtt().is_empty());
        assert!(views.indices_by_role().is_empty());
        assert!(views.indices_for_role(HostRole::Master).is_empty());
    }

    #[test]
    fn test_publish_replaces_both_views() {
        let (publisher, views) = channel();
        let mut by_role = HashMap::new();
        by_role.insert(HostRole::Master, vec![1]);
        by_role.insert(HostRole::Slave, vec![0, 2]);

        publisher.publish(vec![2, 1, 0], by_role);

        assert_eq!(views.alive_by_rtt().as_ref(), &[2, 1, 0]);
        assert_eq!(views.indices_for_role(HostRole::Master), vec![1]);
        assert_eq!(views.indices_for_role(HostRole::Slave), vec![0, 2]);
        assert!(views.indices_for_role(HostRole::SyncSlave).is_empty());
    }

    #[test]
    fn test_held_snapshot_survives_later_publications() {
        let (publisher, views) = channel();
        publisher.publish(vec![0, 1], HashMap::new());

        let held = views.alive_by_rtt();
        publisher.publish(vec![1], HashMap::new());

        // The old snapshot is untouched; a fresh read sees the new one.
        assert_eq!(held.as_ref(), &[0, 1]);
        assert_eq!(views.alive_by_rtt().as_ref(), &[1]);
    }

    #[test]
    fn test_cloned_reader_sees_publications() {
        let (publisher, views) = channel();
        let reader = views.clone();
        publisher.publish(vec![3], HashMap::new());
        assert_eq!(reader.alive_by_rtt().as_ref(), &[3]);
    }
}
