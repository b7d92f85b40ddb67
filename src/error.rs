//! Error types for the SOCKS5 session pipeline
//!
//! Every variant is terminal for the session that raised it. Plumbing code
//! (configuration, listener bootstrap) uses `anyhow` instead.

use std::io;
use thiserror::Error;

/// Errors raised while serving a single SOCKS5 session
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Malformed or unsupported client message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Authentication handshake failed or credentials were rejected
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The destination could not be reached
    #[error("Dial error: failed to connect to {target}: {source}")]
    Dial {
        /// Destination as requested by the client (`host:port`)
        target: String,
        /// Underlying connect or resolution failure
        #[source]
        source: io::Error,
    },

    /// I/O failure while forwarding bytes
    #[error("Relay error: {0}")]
    Relay(#[source] io::Error),

    /// A configured deadline expired
    #[error("Timeout: {0}")]
    Timeout(&'static str),
}

impl ProxyError {
    /// Short, stable name of the error kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Protocol(_) => "protocol",
            ProxyError::Auth(_) => "auth",
            ProxyError::Dial { .. } => "dial",
            ProxyError::Relay(_) => "relay",
            ProxyError::Timeout(_) => "timeout",
        }
    }

    /// Whether the failure was caused by the client rather than the server
    /// or the network
    pub fn is_client_fault(&self) -> bool {
        matches!(self, ProxyError::Protocol(_) | ProxyError::Auth(_))
    }
}

/// Result alias for session-level operations
pub type ProxyResult<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_error_display() {
        let err = ProxyError::Protocol("bad version".to_string());
        assert_eq!(format!("{}", err), "Protocol error: bad version");

        let err = ProxyError::Auth("invalid credentials".to_string());
        assert_eq!(format!("{}", err), "Authentication error: invalid credentials");

        let err = ProxyError::Dial {
            target: "example.com:80".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(
            format!("{}", err),
            "Dial error: failed to connect to example.com:80: refused"
        );

        let err = ProxyError::Relay(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert_eq!(format!("{}", err), "Relay error: pipe");

        let err = ProxyError::Timeout("handshake");
        assert_eq!(format!("{}", err), "Timeout: handshake");
    }

    #[test]
    fn test_proxy_error_kind() {
        assert_eq!(ProxyError::Protocol(String::new()).kind(), "protocol");
        assert_eq!(ProxyError::Auth(String::new()).kind(), "auth");
        assert_eq!(
            ProxyError::Relay(io::Error::new(io::ErrorKind::Other, "x")).kind(),
            "relay"
        );
        assert_eq!(ProxyError::Timeout("dial").kind(), "timeout");
    }

    #[test]
    fn test_client_fault() {
        assert!(ProxyError::Protocol(String::new()).is_client_fault());
        assert!(ProxyError::Auth(String::new()).is_client_fault());
        assert!(!ProxyError::Timeout("handshake").is_client_fault());
        assert!(!ProxyError::Dial {
            target: "127.0.0.1:1".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        }
        .is_client_fault());
    }

    #[test]
    fn test_dial_error_source() {
        use std::error::Error as _;

        let err = ProxyError::Dial {
            target: "127.0.0.1:1".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(err.source().is_some());
    }
}
