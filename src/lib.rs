//! PostgreSQL cluster topology discovery for quorum-commit replication.
//!
//! Probes a fixed list of candidate hosts on a fixed cadence, classifies
//! each as master, synchronous replica, asynchronous replica or unreachable,
//! ranks live hosts by probe RTT and publishes the result as lock-free
//! snapshots, served over HTTP for operators and load balancers.

pub mod cli;
pub mod server;
pub mod topology;
