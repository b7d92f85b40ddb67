//! No authentication method

use tokio::io::AsyncWriteExt;

use super::{AuthenticationMethod, ClientStream};
use crate::error::{ProxyError, ProxyResult};
use crate::protocol::constants::{SOCKS5_AUTH_NONE, SOCKS5_VERSION};

/// Method 0x00: the client is accepted without any exchange beyond the
/// method-select acknowledgment.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait::async_trait]
impl AuthenticationMethod for NoAuth {
    fn code(&self) -> u8 {
        SOCKS5_AUTH_NONE
    }

    fn name(&self) -> &'static str {
        "none"
    }

    async fn authenticate(&self, stream: &mut dyn ClientStream) -> ProxyResult<bool> {
        stream
            .write_all(&[SOCKS5_VERSION, SOCKS5_AUTH_NONE])
            .await
            .map_err(|e| ProxyError::Auth(format!("failed to send method selection: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| ProxyError::Auth(format!("failed to send method selection: {}", e)))?;
        Ok(true)
    }
}
