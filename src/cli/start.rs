use crate::cli::{actions::Action, commands, dispatch::handler, telemetry};
use anyhow::Result;

/// Map -v occurrences to a tracing level; errors only by default.
const fn verbosity_level(count: u8) -> Option<tracing::Level> {
    match count {
        0 => None,
        1 => Some(tracing::Level::INFO),
        2 => Some(tracing::Level::DEBUG),
        _ => Some(tracing::Level::TRACE),
    }
}

/// Parse the command line, initialize telemetry and return the action to run.
///
/// # Errors
///
/// Returns an error if telemetry initialization or argument handling fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(verbosity_level(matches.get_count("verbose")))?;

    handler(&matches)
}
