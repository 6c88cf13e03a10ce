//! OS signal handling.

use crate::lifecycle::Shutdown;

/// Wait for Ctrl+C (SIGINT), then trigger `shutdown`.
///
/// If the handler cannot be installed the error is logged and shutdown is
/// never triggered from here; the process still stops on SIGKILL.
pub async fn shutdown_on_ctrl_c(shutdown: &Shutdown) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Ctrl+C received");
            shutdown.trigger();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
