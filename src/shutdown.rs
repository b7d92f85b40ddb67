//! Graceful Shutdown Handling
//!
//! Waits for SIGTERM, SIGINT or Ctrl+C, then stops the listener and gives
//! running sessions a bounded amount of time to finish on their own.

use std::time::Duration;
use tokio::signal;
use tracing::info;

use crate::connection::ConnectionManager;
use crate::Result;

/// Shutdown coordinator that manages graceful shutdown process
pub struct ShutdownCoordinator {
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// How long sessions are given to drain
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for a termination signal
    pub async fn listen_for_signals(&self) -> Result<()> {
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                }
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                }
            }
        }

        #[cfg(windows)]
        {
            signal::ctrl_c().await?;
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        Ok(())
    }

    /// Stop the listener and wait for its sessions.
    ///
    /// Returns the number of sessions still running when the timeout hit.
    pub async fn shutdown_connection_manager(&self, manager: &ConnectionManager) -> usize {
        info!("Initiating graceful shutdown of connection manager");
        manager.shutdown();
        manager.wait_for_sessions(self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Logger;
    use crate::session::SessionOptions;

    #[tokio::test]
    async fn test_shutdown_stops_running_accept_loop() {
        let manager = std::sync::Arc::new(
            ConnectionManager::bind_with_options(
                "127.0.0.1:0",
                SessionOptions::new(vec![std::sync::Arc::new(crate::auth::NoAuth)]),
                Logger::disabled(),
            )
            .await
            .unwrap(),
        );
        let runner = std::sync::Arc::clone(&manager);
        let server = tokio::spawn(async move { runner.run().await });
        // Let the accept loop subscribe before signalling
        tokio::time::sleep(Duration::from_millis(50)).await;

        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        assert_eq!(coordinator.timeout(), Duration::from_secs(5));
        assert_eq!(coordinator.shutdown_connection_manager(&manager).await, 0);

        let stopped = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("accept loop kept running");
        assert!(stopped.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_idle_connection_manager() {
        let manager = ConnectionManager::bind_with_options(
            "127.0.0.1:0",
            SessionOptions::new(vec![std::sync::Arc::new(crate::auth::NoAuth)]),
            Logger::disabled(),
        )
        .await
        .unwrap();

        let coordinator = ShutdownCoordinator::new(Duration::from_millis(200));
        let remaining = coordinator.shutdown_connection_manager(&manager).await;
        assert_eq!(remaining, 0);
    }
}
