//! Authentication Module
//!
//! Pluggable SOCKS5 authentication methods. The negotiator only ever sees
//! `dyn AuthenticationMethod`, so a new method is added by implementing the
//! trait and placing an instance in the configured method list.

pub mod none;
pub mod userpass;

pub use none::NoAuth;
pub use userpass::{Credentials, UsernamePassword};

use std::fmt::Debug;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::ProxyResult;

/// Byte stream an authentication handshake runs on.
///
/// Object-safe alias so that methods can be stored as trait objects while
/// sessions stay generic over the transport.
pub trait ClientStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ClientStream for T {}

/// A SOCKS5 authentication method
#[async_trait::async_trait]
pub trait AuthenticationMethod: Send + Sync + Debug {
    /// Method code advertised during negotiation
    fn code(&self) -> u8;

    /// Human-readable method name for logs
    fn name(&self) -> &'static str;

    /// Run the method's handshake on the client stream.
    ///
    /// The method writes the method-select acknowledgment itself. Returns
    /// `Ok(false)` when the client completed the exchange but was rejected.
    async fn authenticate(&self, stream: &mut dyn ClientStream) -> ProxyResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_stream_blanket_impl() {
        fn assert_client_stream<T: ClientStream>() {}
        assert_client_stream::<tokio::io::DuplexStream>();
        assert_client_stream::<tokio::net::TcpStream>();
    }

    #[test]
    fn test_methods_as_trait_objects() {
        let methods: Vec<Box<dyn AuthenticationMethod>> = vec![
            Box::new(NoAuth),
            Box::new(UsernamePassword::new("admin", "123456")),
        ];
        let codes: Vec<u8> = methods.iter().map(|m| m.code()).collect();
        assert_eq!(codes, vec![0x00, 0x02]);
    }
}
