//! socks5-proxy - SOCKS5 proxy server binary

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use socks5_proxy::{
    config::{AuthMethodConfig, Config, ConfigManager, LogFormat},
    logging::Logger,
    ConnectionManager, ShutdownCoordinator,
};

/// CLI arguments for socks5-proxy
#[derive(Parser, Debug)]
#[command(name = "socks5-proxy")]
#[command(about = "SOCKS5 proxy server with pluggable authentication")]
#[command(version)]
#[command(long_about = "
SOCKS5 proxy server supporting CONNECT over IPv4 and domain-name
destinations, with no-auth and username/password authentication.

Configuration priority (highest to lowest):
1. Command-line arguments
2. Configuration file
3. Environment variables
4. Built-in defaults

Environment variables:
  SOCKS5_HOST               - Listen host (e.g., 0.0.0.0)
  SOCKS5_PORT               - Listen port
  SOCKS5_BUFFER_SIZE        - Relay buffer size in bytes
  SOCKS5_HANDSHAKE_TIMEOUT  - Handshake deadline (e.g., 10s)
  SOCKS5_CONNECT_TIMEOUT    - Destination connect deadline (e.g., 5s)
  SOCKS5_LOG_LEVEL          - Log level (trace, debug, info, warn, error)
  SOCKS5_LOG_ENABLED        - Enable logging (true/false)
")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "config.toml",
        help = "Path to configuration file"
    )]
    pub config: PathBuf,

    /// Listen host (overrides config file)
    #[arg(long, help = "Listen host (e.g., 127.0.0.1)")]
    pub host: Option<String>,

    /// Port to bind to (overrides config file)
    #[arg(short, long, help = "Port to bind to")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, help = "Log level")]
    pub log_level: Option<String>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Require this username (with --password)
    #[arg(short, long, requires = "password", help = "Username for authentication")]
    pub username: Option<String>,

    /// Password for --username
    #[arg(long, requires = "username", help = "Password for authentication")]
    pub password: Option<String>,

    /// Disable authentication (overrides config file)
    #[arg(long, conflicts_with = "username", help = "Disable authentication")]
    pub no_auth: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration and exit")]
    pub validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Config loading reports to stderr until the configured sink exists
    let bootstrap_level = if args.verbose { "debug" } else { "info" };
    let bootstrap = Logger::with_writer(bootstrap_level, LogFormat::Text, std::io::stderr)?;
    let config = tracing::dispatcher::with_default(bootstrap.dispatch(), || load_config(&args))?;

    let logger = Logger::from_config(&config.logging).context("Failed to initialize logging")?;
    logger.install_global()?;

    info!(
        "Starting socks5-proxy v{}",
        env!("CARGO_PKG_VERSION")
    );

    if args.validate_config {
        info!("Configuration is valid");
        log_summary(&config);
        return Ok(());
    }

    log_summary(&config);

    let shutdown_coordinator = ShutdownCoordinator::new(config.server.shutdown_timeout);
    let connection_manager = Arc::new(ConnectionManager::bind(&config, logger).await?);
    info!("Listening on {}", connection_manager.local_addr()?);

    let server = Arc::clone(&connection_manager);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {}", e);
        }
    });

    info!("Press Ctrl+C or send SIGTERM/SIGINT to shutdown gracefully");

    if let Err(e) = shutdown_coordinator.listen_for_signals().await {
        error!("Error setting up signal handlers: {}", e);
    }

    info!("Initiating graceful shutdown...");
    let remaining = shutdown_coordinator
        .shutdown_connection_manager(&connection_manager)
        .await;

    if let Err(e) = server_handle.await {
        if !e.is_cancelled() {
            error!("Server task failed: {}", e);
        }
    }

    info!(remaining_sessions = remaining, "Server shutdown complete");
    Ok(())
}

/// Load configuration with priority: CLI args > config file > environment > defaults
fn load_config(args: &CliArgs) -> Result<Config> {
    let mut config = if args.config.exists() {
        ConfigManager::load_from_file(&args.config)?
    } else {
        info!("Config file not found, checking environment variables");
        ConfigManager::load_from_env()?
    };

    let log_level = if args.verbose {
        Some("debug")
    } else {
        args.log_level.as_deref()
    };
    let credentials = args.username.as_deref().zip(args.password.as_deref());

    config.merge_with_cli_args(
        args.host.as_deref(),
        args.port,
        log_level,
        credentials,
        args.no_auth,
    );

    config
        .validate()
        .context("Final configuration validation failed")?;
    Ok(config)
}

fn log_summary(config: &Config) {
    let methods: Vec<&str> = config
        .auth
        .methods
        .iter()
        .map(|method| match method {
            AuthMethodConfig::None => "none",
            AuthMethodConfig::Userpass { .. } => "userpass",
        })
        .collect();

    info!("Configuration summary:");
    info!("  Listen address: {}", config.listen_addr());
    info!("  Authentication methods: {}", methods.join(", "));
    info!("  Buffer size: {} bytes", config.server.buffer_size);
    info!("  Handshake timeout: {:?}", config.server.handshake_timeout);
    info!("  Connect timeout: {:?}", config.server.connect_timeout);
    info!("  Shutdown timeout: {:?}", config.server.shutdown_timeout);
}
