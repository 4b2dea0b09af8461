use tokio::signal;
use tracing::{error, info};

/// Resolves on Ctrl+C or SIGTERM. If a handler cannot be installed the
/// error is logged and that signal is never awaited.
pub async fn wait_for_shutdown() {
    tokio::select! {
        _ = wait_ctrl_c() => {},
        _ = wait_sigterm() => {},
    }
    info!("Shutdown signal received, stopping server");
}

async fn wait_ctrl_c() {
    if let Err(err) = signal::ctrl_c().await {
        error!(%err, "Error handling Ctrl+C signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_sigterm() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut handler) => {
            handler.recv().await;
        }
        Err(err) => {
            error!(%err, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_sigterm() {
    std::future::pending::<()>().await;
}
