use crate::cli::actions::Action;
use anyhow::Result;
use secrecy::SecretString;

/// Map parsed arguments to the action to run. DSNs are wrapped in
/// `SecretString` here and stay wrapped until the probe layer needs them.
///
/// # Errors
///
/// Does not fail today; kept fallible for parity with handlers that do
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let dsns: Vec<SecretString> = matches
        .get_many::<String>("dsn")
        .map(|values| values.map(|dsn| SecretString::from(dsn.clone())).collect())
        .unwrap_or_default();

    Ok(Action::Run {
        port: matches.get_one::<u16>("port").copied().unwrap_or(9434),
        listen: matches.get_one::<String>("listen").cloned(),
        dsns,
        probe_timeout_ms: matches
            .get_one::<u64>("probe-timeout-ms")
            .copied()
            .unwrap_or(1000),
        discovery_interval_ms: matches
            .get_one::<u64>("discovery-interval-ms")
            .copied()
            .unwrap_or(1000),
    })
}
