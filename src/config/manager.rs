//! Configuration Manager

use super::{AuthMethodConfig, Config, LoggingConfig, UserConfig};
use crate::Result;
use anyhow::{bail, Context};
use std::collections::HashSet;
use std::path::Path;

/// Log levels accepted in configuration
pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Manages configuration loading and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if path.exists() {
            tracing::info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

            config
                .validate()
                .with_context(|| "Configuration validation failed")?;

            tracing::info!("Configuration loaded and validated successfully");
            Ok(config)
        } else {
            tracing::warn!("Configuration file not found at {}, using defaults", path.display());
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Config> {
        let mut config = Config::default();
        Self::apply_env(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override `config` with `SOCKS5_*` variables looked up through `lookup`
    pub fn apply_env<F>(config: &mut Config, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SOCKS5_HOST") {
            config.server.host = host;
        }

        if let Some(port) = lookup("SOCKS5_PORT") {
            config.server.port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid SOCKS5_PORT: {}", port))?;
        }

        if let Some(buffer_size) = lookup("SOCKS5_BUFFER_SIZE") {
            config.server.buffer_size = buffer_size
                .parse::<usize>()
                .with_context(|| format!("Invalid SOCKS5_BUFFER_SIZE: {}", buffer_size))?;
        }

        if let Some(timeout) = lookup("SOCKS5_HANDSHAKE_TIMEOUT") {
            config.server.handshake_timeout = Some(
                humantime::parse_duration(&timeout)
                    .with_context(|| format!("Invalid SOCKS5_HANDSHAKE_TIMEOUT: {}", timeout))?,
            );
        }

        if let Some(timeout) = lookup("SOCKS5_CONNECT_TIMEOUT") {
            config.server.connect_timeout = Some(
                humantime::parse_duration(&timeout)
                    .with_context(|| format!("Invalid SOCKS5_CONNECT_TIMEOUT: {}", timeout))?,
            );
        }

        if let Some(log_level) = lookup("SOCKS5_LOG_LEVEL") {
            config.logging.level = log_level;
        }

        if let Some(enabled) = lookup("SOCKS5_LOG_ENABLED") {
            config.logging.enabled = enabled
                .parse::<bool>()
                .with_context(|| format!("Invalid SOCKS5_LOG_ENABLED: {}", enabled))?;
        }

        Ok(())
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.validate_server_config()
            .with_context(|| "Server configuration validation failed")?;

        self.validate_auth_config()
            .with_context(|| "Authentication configuration validation failed")?;

        self.logging
            .validate()
            .with_context(|| "Logging configuration validation failed")?;

        Ok(())
    }

    fn validate_server_config(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            bail!("host must not be empty");
        }

        if self.server.buffer_size < 1024 {
            bail!("buffer_size must be at least 1024 bytes");
        }

        if self.server.buffer_size > 1048576 {
            bail!("buffer_size cannot exceed 1MB");
        }

        for (name, timeout) in [
            ("handshake_timeout", self.server.handshake_timeout),
            ("connect_timeout", self.server.connect_timeout),
        ] {
            if timeout.is_some_and(|t| t.is_zero()) {
                bail!("{} must be greater than 0", name);
            }
        }

        Ok(())
    }

    fn validate_auth_config(&self) -> Result<()> {
        if self.auth.methods.is_empty() {
            bail!("at least one authentication method must be configured");
        }

        let mut seen = HashSet::new();
        for method in &self.auth.methods {
            if !seen.insert(method.code()) {
                bail!("authentication method {:#04x} is configured twice", method.code());
            }

            if let AuthMethodConfig::Userpass { users } = method {
                if users.is_empty() {
                    bail!("userpass authentication requires at least one user");
                }
                for (i, user) in users.iter().enumerate() {
                    validate_user(i, user)?;
                }
            }
        }

        Ok(())
    }

    /// Merge with CLI arguments
    pub fn merge_with_cli_args(
        &mut self,
        host: Option<&str>,
        port: Option<u16>,
        log_level: Option<&str>,
        credentials: Option<(&str, &str)>,
        no_auth: bool,
    ) {
        if let Some(host) = host {
            self.server.host = host.to_string();
            tracing::info!("CLI override: host set to {}", host);
        }

        if let Some(port) = port {
            self.server.port = port;
            tracing::info!("CLI override: port set to {}", port);
        }

        if let Some(level) = log_level {
            self.logging.level = level.to_string();
            tracing::info!("CLI override: log level set to {}", level);
        }

        if no_auth {
            self.auth.methods = vec![AuthMethodConfig::None];
            tracing::info!("CLI override: authentication disabled");
        } else if let Some((username, password)) = credentials {
            self.auth
                .methods
                .retain(|method| !matches!(method, AuthMethodConfig::Userpass { .. }));
            self.auth.methods.insert(
                0,
                AuthMethodConfig::Userpass {
                    users: vec![UserConfig {
                        username: username.to_string(),
                        password: password.to_string(),
                    }],
                },
            );
            tracing::info!("CLI override: username/password authentication for {}", username);
        }
    }
}

impl LoggingConfig {
    /// Validate the logging section
    pub fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            bail!("logging.level must be one of: {}", VALID_LOG_LEVELS.join(", "));
        }
        Ok(())
    }
}

fn validate_user(i: usize, user: &UserConfig) -> Result<()> {
    if user.username.is_empty() {
        bail!("User {} has empty username", i);
    }

    if user.username.len() > 255 {
        bail!("User {} username exceeds 255 bytes", i);
    }

    if user.password.is_empty() {
        bail!("User {} has empty password", i);
    }

    if user.password.len() > 255 {
        bail!("User {} password exceeds 255 bytes", i);
    }

    Ok(())
}
