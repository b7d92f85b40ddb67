//! Method Negotiation
//!
//! Reads the client hello and picks the authentication method. Selection
//! follows the server's configured order, not the client's.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::auth::AuthenticationMethod;
use crate::error::{ProxyError, ProxyResult};
use crate::protocol::constants::*;

/// Client greeting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub version: u8,
    pub methods: Vec<u8>,
}

/// Pick the first configured method whose code the client offered
pub fn select_method(
    configured: &[Arc<dyn AuthenticationMethod>],
    offered: &[u8],
) -> Option<Arc<dyn AuthenticationMethod>> {
    configured
        .iter()
        .find(|method| offered.contains(&method.code()))
        .cloned()
}

/// Read the client greeting
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
pub async fn read_greeting<S>(stream: &mut S) -> ProxyResult<Greeting>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 2];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|e| ProxyError::Protocol(format!("failed to read greeting header: {}", e)))?;

    let version = header[0];
    if version != SOCKS5_VERSION {
        return Err(ProxyError::Protocol(format!(
            "unsupported SOCKS version: {}",
            version
        )));
    }

    let mut methods = vec![0u8; header[1] as usize];
    stream
        .read_exact(&mut methods)
        .await
        .map_err(|e| ProxyError::Protocol(format!("failed to read auth methods: {}", e)))?;

    Ok(Greeting { version, methods })
}

/// Negotiate the authentication method for a new client.
///
/// On success the selected method still has to run its handshake, which
/// also writes the method-select acknowledgment. When nothing offered is
/// acceptable, `[0x05, 0xFF]` is sent before failing.
pub async fn negotiate<S>(
    stream: &mut S,
    configured: &[Arc<dyn AuthenticationMethod>],
) -> ProxyResult<Arc<dyn AuthenticationMethod>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let greeting = read_greeting(stream).await?;
    debug!(offered = ?greeting.methods, "Received client greeting");

    match select_method(configured, &greeting.methods) {
        Some(method) => {
            debug!(method = method.name(), "Selected authentication method");
            Ok(method)
        }
        None => {
            let rejection = [SOCKS5_VERSION, SOCKS5_AUTH_NO_ACCEPTABLE];
            if let Err(e) = stream.write_all(&rejection).await {
                debug!(error = %e, "Failed to send method rejection");
            } else if let Err(e) = stream.flush().await {
                debug!(error = %e, "Failed to send method rejection");
            }
            Err(ProxyError::Protocol(format!(
                "no acceptable authentication method in {:?}",
                greeting.methods
            )))
        }
    }
}
