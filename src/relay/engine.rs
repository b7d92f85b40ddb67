//! Relay Engine
//!
//! Forwards bytes in both directions between the client and the destination
//! until both sides have finished sending.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::debug;

use super::RelayStats;
use crate::error::{ProxyError, ProxyResult};

/// Default per-direction buffer size
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Relay bytes between `client` and `dest`.
///
/// Each direction runs in its own task. EOF on one side half-closes the
/// other side's write half, and the opposite direction keeps copying until
/// its own EOF. An I/O error in either direction stops both. Returns once
/// both directions are done.
pub async fn relay<C, D>(client: C, dest: D, buffer_size: usize) -> ProxyResult<RelayStats>
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    D: AsyncRead + AsyncWrite + Send + 'static,
{
    let start = Instant::now();

    let (client_read, client_write) = tokio::io::split(client);
    let (dest_read, dest_write) = tokio::io::split(dest);

    let (failed_tx, failed_rx) = watch::channel(false);
    let failed_tx = Arc::new(failed_tx);

    let upstream = tokio::spawn(pipe(
        "up",
        client_read,
        dest_write,
        buffer_size,
        failed_tx.clone(),
        failed_rx.clone(),
    ));
    let downstream = tokio::spawn(pipe(
        "down",
        dest_read,
        client_write,
        buffer_size,
        failed_tx,
        failed_rx,
    ));

    let (upstream, downstream) = tokio::join!(upstream, downstream);
    let (bytes_up, up_result) = upstream.map_err(join_error)?;
    let (bytes_down, down_result) = downstream.map_err(join_error)?;

    up_result.map_err(ProxyError::Relay)?;
    down_result.map_err(ProxyError::Relay)?;

    Ok(RelayStats {
        bytes_up,
        bytes_down,
        duration: start.elapsed(),
    })
}

/// Copy one direction until EOF, an error, or an error in the peer direction
async fn pipe<R, W>(
    direction: &'static str,
    reader: R,
    writer: W,
    buffer_size: usize,
    failed: Arc<watch::Sender<bool>>,
    mut stop: watch::Receiver<bool>,
) -> (u64, io::Result<()>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::with_capacity(buffer_size, reader);
    let mut writer = CountingWriter::new(writer);

    let result = tokio::select! {
        copied = tokio::io::copy_buf(&mut reader, &mut writer) => copied.map(|_| ()),
        _ = stop.changed() => {
            debug!(direction, "Peer direction failed, stopping");
            Ok(())
        }
    };

    if let Err(e) = &result {
        debug!(direction, error = %e, "Relay direction failed");
        let _ = failed.send(true);
    }

    if let Err(e) = writer.shutdown().await {
        debug!(direction, error = %e, "Failed to shut down write half");
    }

    (writer.bytes, result)
}

fn join_error(e: tokio::task::JoinError) -> ProxyError {
    ProxyError::Relay(io::Error::new(io::ErrorKind::Other, e))
}

/// Writer wrapper that counts accepted bytes, including partial copies of a
/// direction that was stopped.
struct CountingWriter<W> {
    inner: W,
    bytes: u64,
}

impl<W> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CountingWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.bytes += n as u64;
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
