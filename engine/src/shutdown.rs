//! Graceful shutdown for the overlay node.
//!
//! Listens for SIGINT/SIGTERM and notifies every subscriber through a
//! `tokio::sync::watch` channel, so late subscribers still observe a
//! shutdown that already happened.

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.tx.borrow()
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// Resolves once shutdown has been triggered. Suitable for
    /// `axum::serve(..).with_graceful_shutdown(..)`.
    pub fn signalled(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe();
        async move {
            // An error means the controller is gone, which also ends the wait.
            let _ = rx.wait_for(|down| *down).await;
        }
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "cannot install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { info!("received SIGINT, shutting down"); }
            _ = terminate => { info!("received SIGTERM, shutting down"); }
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn programmatic_shutdown_resolves_waiters() {
        let controller = ShutdownController::new();
        let waiter = controller.signalled();
        controller.shutdown();
        waiter.await;
        assert!(controller.is_shutting_down());
    }

    #[tokio::test]
    async fn late_subscribers_see_earlier_shutdown() {
        let controller = ShutdownController::new();
        controller.shutdown();
        let rx = controller.subscribe();
        assert!(*rx.borrow());
        controller.signalled().await;
    }
}
