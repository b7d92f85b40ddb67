//! Connection Manager Implementation

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::logging::Logger;
use crate::session::{next_session_id, Session, SessionOptions};
use crate::Result;

/// Accepts TCP connections and runs one session task per connection
pub struct ConnectionManager {
    listener: TcpListener,
    options: Arc<SessionOptions>,
    logger: Logger,
    active_sessions: Arc<AtomicUsize>,
    shutdown_tx: broadcast::Sender<()>,
}

/// Decrements the active session count when a session task ends
struct ActiveSession(Arc<AtomicUsize>);

impl ActiveSession {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConnectionManager {
    /// Bind the listener described by `config`
    pub async fn bind(config: &Config, logger: Logger) -> Result<Self> {
        Self::bind_with_options(&config.listen_addr(), SessionOptions::from_config(config), logger)
            .await
    }

    /// Bind `addr` and serve sessions with the given options
    pub async fn bind_with_options(
        addr: &str,
        options: SessionOptions,
        logger: Logger,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind TCP listener to {}", addr))?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            listener,
            options: Arc::new(options),
            logger,
            active_sessions: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    /// Number of sessions currently running
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Stop the accept loop. Running sessions are left to finish.
    pub fn shutdown(&self) {
        if self.shutdown_tx.send(()).is_err() {
            debug!("Shutdown requested while accept loop is not running");
        }
    }

    /// Accept connections until [`shutdown`](Self::shutdown) is called
    pub async fn run(&self) -> Result<()> {
        self.accept_connections()
            .with_subscriber(self.logger.dispatch().clone())
            .await
    }

    async fn accept_connections(&self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!(addr = %self.local_addr()?, "Accepting SOCKS5 connections");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.spawn_session(stream, peer),
                        Err(e) => {
                            // Keep accepting even if one fails
                            error!("Error accepting connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal, stopping connection acceptance");
                    break;
                }
            }
        }

        info!("Connection acceptance loop stopped");
        Ok(())
    }

    fn spawn_session(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let id = next_session_id();
        let span = info_span!("session", id = %id, peer = %peer);
        let guard = ActiveSession::enter(&self.active_sessions);
        let session = Session::new(id, stream, Arc::clone(&self.options));

        let task = async move {
            let _guard = guard;
            debug!("Accepted connection");
            let started = Instant::now();
            // Failures are already logged by the session
            let _ = session.run().await;
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Connection closed");
        };

        tokio::spawn(
            task.instrument(span)
                .with_subscriber(self.logger.dispatch().clone()),
        );
    }

    /// Wait up to `limit` for running sessions to finish.
    ///
    /// Returns the number of sessions still active afterwards.
    pub async fn wait_for_sessions(&self, limit: Duration) -> usize {
        let start = Instant::now();
        let mut last_count = self.active_sessions();
        info!("Waiting for {} active sessions to close (timeout: {:?})", last_count, limit);

        while last_count > 0 && start.elapsed() < limit {
            tokio::time::sleep(Duration::from_millis(50)).await;

            let current = self.active_sessions();
            if current != last_count {
                debug!("Active sessions: {} -> {}", last_count, current);
                last_count = current;
            }
        }

        if last_count == 0 {
            info!("All sessions closed in {:?}", start.elapsed());
        } else {
            warn!(
                "Shutdown timeout reached after {:?} with {} sessions still active",
                start.elapsed(),
                last_count
            );
        }
        last_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn start_manager() -> (Arc<ConnectionManager>, SocketAddr) {
        let options = SessionOptions::new(vec![Arc::new(NoAuth)]);
        let manager = Arc::new(
            ConnectionManager::bind_with_options("127.0.0.1:0", options, Logger::disabled())
                .await
                .unwrap(),
        );
        let addr = manager.local_addr().unwrap();
        let runner = Arc::clone(&manager);
        tokio::spawn(async move { runner.run().await });
        (manager, addr)
    }

    #[tokio::test]
    async fn test_active_session_tracking() {
        let (manager, addr) = start_manager().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut selection = [0u8; 2];
        client.read_exact(&mut selection).await.unwrap();
        assert_eq!(selection, [0x05, 0x00]);
        assert_eq!(manager.active_sessions(), 1);

        drop(client);
        let remaining = manager.wait_for_sessions(Duration::from_secs(5)).await;
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let (manager, addr) = start_manager().await;
        // Let the accept loop subscribe before signalling
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.shutdown();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The listener socket stays bound, but nobody serves the session
        if let Ok(mut client) = TcpStream::connect(addr).await {
            client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
            let mut selection = [0u8; 2];
            let read = tokio::time::timeout(
                Duration::from_millis(200),
                client.read_exact(&mut selection),
            )
            .await;
            assert!(read.is_err());
        }
        assert_eq!(manager.active_sessions(), 0);
    }
}
