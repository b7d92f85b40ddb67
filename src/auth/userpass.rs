//! Username/password authentication method

use std::fmt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use super::{AuthenticationMethod, ClientStream};
use crate::error::{ProxyError, ProxyResult};
use crate::protocol::constants::*;

/// A username/password pair accepted by [`UsernamePassword`]
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: Vec<u8>,
    pub password: Vec<u8>,
}

impl Credentials {
    pub fn new(username: impl Into<Vec<u8>>, password: impl Into<Vec<u8>>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Method 0x02: length-prefixed username and password checked by exact
/// byte equality against the configured pairs.
#[derive(Debug, Clone)]
pub struct UsernamePassword {
    users: Vec<Credentials>,
}

impl UsernamePassword {
    /// Create a method accepting a single credential pair
    pub fn new(username: impl Into<Vec<u8>>, password: impl Into<Vec<u8>>) -> Self {
        Self {
            users: vec![Credentials::new(username, password)],
        }
    }

    /// Create a method accepting any of the given credential pairs
    pub fn with_users(users: impl IntoIterator<Item = Credentials>) -> Self {
        Self {
            users: users.into_iter().collect(),
        }
    }

    /// Number of configured credential pairs
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn verify(&self, username: &[u8], password: &[u8]) -> bool {
        self.users
            .iter()
            .any(|user| user.username == username && user.password == password)
    }

    /// Read one length-prefixed field
    async fn read_field(stream: &mut dyn ClientStream, field: &str) -> ProxyResult<Vec<u8>> {
        let len = stream
            .read_u8()
            .await
            .map_err(|e| ProxyError::Auth(format!("failed to read {} length: {}", field, e)))?;

        let mut value = vec![0u8; len as usize];
        stream
            .read_exact(&mut value)
            .await
            .map_err(|e| ProxyError::Auth(format!("failed to read {}: {}", field, e)))?;

        Ok(value)
    }
}

/// Send a two-byte frame and flush it
async fn send_frame(stream: &mut dyn ClientStream, frame: [u8; 2], what: &str) -> ProxyResult<()> {
    stream
        .write_all(&frame)
        .await
        .map_err(|e| ProxyError::Auth(format!("failed to send {}: {}", what, e)))?;
    stream
        .flush()
        .await
        .map_err(|e| ProxyError::Auth(format!("failed to send {}: {}", what, e)))
}

#[async_trait::async_trait]
impl AuthenticationMethod for UsernamePassword {
    fn code(&self) -> u8 {
        SOCKS5_AUTH_USERPASS
    }

    fn name(&self) -> &'static str {
        "userpass"
    }

    /// Run the sub-negotiation
    ///
    /// ```text
    /// client: +------+----------+------+----------+
    ///         | ULEN |  UNAME   | PLEN |  PASSWD  |
    ///         +------+----------+------+----------+
    ///         |  1   | 0 to 255 |  1   | 0 to 255 |
    ///         +------+----------+------+----------+
    /// server: [0x05][STATUS]
    /// ```
    async fn authenticate(&self, stream: &mut dyn ClientStream) -> ProxyResult<bool> {
        send_frame(stream, [SOCKS5_VERSION, SOCKS5_AUTH_USERPASS], "method selection").await?;

        let username = Self::read_field(stream, "username").await?;
        let password = Self::read_field(stream, "password").await?;

        if self.verify(&username, &password) {
            send_frame(stream, [SOCKS5_VERSION, SOCKS5_USERPASS_SUCCESS], "auth status").await?;
            debug!(user = %String::from_utf8_lossy(&username), "Credentials accepted");
            Ok(true)
        } else {
            send_frame(stream, [SOCKS5_VERSION, SOCKS5_USERPASS_FAILURE], "auth status").await?;
            warn!(user = %String::from_utf8_lossy(&username), "Credentials rejected");
            Ok(false)
        }
    }
}
