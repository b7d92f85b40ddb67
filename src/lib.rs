//! socks5-proxy library
//!
//! Protocol core of a SOCKS5 proxy server: method negotiation, pluggable
//! authentication, request dispatch and bidirectional relay, plus the
//! listener, configuration and logging plumbing around it.

pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod relay;
pub mod session;
pub mod shutdown;

pub use config::Config;
pub use connection::ConnectionManager;
pub use error::{ProxyError, ProxyResult};
pub use logging::Logger;
pub use session::{Session, SessionOptions};
pub use shutdown::ShutdownCoordinator;

/// Common error type for the proxy server plumbing
pub type Result<T> = anyhow::Result<T>;
