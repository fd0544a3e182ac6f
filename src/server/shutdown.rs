use anyhow::{Context, Result};
use tokio::signal;

/// Resolves on SIGINT or SIGTERM (Ctrl+C only on non-Unix targets).
///
/// # Errors
///
/// Returns an error if a signal handler cannot be installed.
pub async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .context("failed to install SIGINT handler")?;
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => tracing::info!("received SIGINT"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("failed to install Ctrl+C handler")?;
        tracing::info!("received Ctrl+C");
    }

    Ok(())
}

/// `()`-returning wrapper for axum's graceful shutdown hook; handler-install
/// errors are logged, not propagated.
pub async fn shutdown_signal_handler() {
    if let Err(error) = shutdown_signal().await {
        tracing::error!(%error, "error setting up shutdown handler");
    }
}
