//! Shutdown signals
//!
//! The host stops its console loop and exits on SIGTERM, SIGINT or Ctrl+C.

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

/// Wait until the process is asked to stop
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (unix_signal(SignalKind::terminate()), unix_signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Could not register signal handlers ({}), falling back to Ctrl+C", e);
                    signal::ctrl_c().await.ok();
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
            _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => warn!("Could not listen for Ctrl+C: {}", e),
        }
    }
}

/// Spawn a watcher that flips the returned receiver to `true` on shutdown
///
/// Must be called from inside a Tokio runtime.
pub fn create_shutdown_receiver() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        // No receivers left means nobody is waiting for shutdown
        let _ = tx.send(true);
    });
    rx
}
