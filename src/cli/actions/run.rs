use crate::cli::actions::Action;
use crate::server;
use crate::topology::{Discovery, Settings};
use anyhow::Result;
use std::time::Duration;

/// Handle the run action: start discovery against the DSN list, then serve
/// the views over HTTP until a shutdown signal arrives. Discovery is stopped
/// (and every probe connection closed) before returning.
///
/// # Errors
///
/// Returns an error if a DSN is malformed or the server fails to start
pub async fn handle(action: Action) -> Result<()> {
    let Action::Run {
        port,
        listen,
        dsns,
        probe_timeout_ms,
        discovery_interval_ms,
    } = action;

    let settings = Settings::new(dsns)
        .with_probe_timeout(Duration::from_millis(probe_timeout_ms))
        .with_discovery_interval(Duration::from_millis(discovery_interval_ms));

    let discovery = Discovery::connect(settings).await?;

    let result = server::new(port, listen, &discovery).await;

    discovery.stop().await;

    result
}
