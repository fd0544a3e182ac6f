pub mod run;

use secrecy::SecretString;

#[derive(Debug)]
pub enum Action {
    Run {
        port: u16,
        listen: Option<String>,
        dsns: Vec<SecretString>,
        probe_timeout_ms: u64,
        discovery_interval_ms: u64,
    },
}
