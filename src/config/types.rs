//! Configuration Types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthenticationMethod, Credentials, NoAuth, UsernamePassword};
use crate::relay::DEFAULT_BUFFER_SIZE;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub buffer_size: usize,
    /// Deadline for negotiation, authentication and dispatch together
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub handshake_timeout: Option<Duration>,
    /// Deadline for each destination connect attempt
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AuthConfig {
    /// Methods in server priority order
    pub methods: Vec<AuthMethodConfig>,
}

/// One configured authentication method
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthMethodConfig {
    None,
    Userpass { users: Vec<UserConfig> },
}

/// User configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UserConfig {
    pub username: String,
    pub password: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: String,
    pub output: LogOutput,
    pub format: LogFormat,
}

/// Where log lines are written
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    Stderr,
    File(PathBuf),
}

/// Log line encoding
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Create a configuration listening on `host:port` with no authentication
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let mut config = Self::default();
        config.server.host = host.into();
        config.server.port = port;
        config
    }

    /// Address the listener binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Build the authenticators in configured order
    pub fn authenticators(&self) -> Vec<Arc<dyn AuthenticationMethod>> {
        self.auth
            .methods
            .iter()
            .map(|method| -> Arc<dyn AuthenticationMethod> {
                match method {
                    AuthMethodConfig::None => Arc::new(NoAuth),
                    AuthMethodConfig::Userpass { users } => {
                        Arc::new(UsernamePassword::with_users(users.iter().map(|user| {
                            Credentials::new(user.username.as_bytes(), user.password.as_bytes())
                        })))
                    }
                }
            })
            .collect()
    }
}

impl AuthMethodConfig {
    /// Method code this entry registers
    pub fn code(&self) -> u8 {
        match self {
            AuthMethodConfig::None => crate::protocol::SOCKS5_AUTH_NONE,
            AuthMethodConfig::Userpass { .. } => crate::protocol::SOCKS5_AUTH_USERPASS,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1080,
            buffer_size: DEFAULT_BUFFER_SIZE,
            handshake_timeout: None,
            connect_timeout: None,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            methods: vec![AuthMethodConfig::None],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            output: LogOutput::Stdout,
            format: LogFormat::Text,
        }
    }
}
