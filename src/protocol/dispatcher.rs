//! Request Dispatch
//!
//! Parses the client request one field at a time, handles the command and
//! answers with exactly one reply.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{ProxyError, ProxyResult};
use crate::protocol::constants::*;
use crate::protocol::types::{Command, Reply, ReplyCode, Request, TargetAddr};

/// Reads a request, handles its command and opens the destination connection
#[derive(Debug, Clone, Default)]
pub struct RequestDispatcher {
    connect_timeout: Option<Duration>,
}

impl RequestDispatcher {
    /// Create a dispatcher whose dial attempts never time out
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher bounding every connect attempt
    pub fn with_connect_timeout(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }

    /// Read one request and serve it.
    ///
    /// Returns the open destination connection and the parsed request once
    /// the success reply has been written. Every failure after parsing has
    /// already been answered on the wire.
    pub async fn dispatch<S>(&self, stream: &mut S) -> ProxyResult<(TcpStream, Request)>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request = self.read_request(stream).await?;
        debug!(command = %request.command, target = %request.destination(), "Received request");

        match request.command {
            Command::Connect => {}
            other => {
                send_reply(stream, Reply::new(ReplyCode::CommandNotSupported)).await;
                return Err(ProxyError::Protocol(format!(
                    "unsupported command: {}",
                    other
                )));
            }
        }

        let target = match self.connect_to_target(&request).await {
            Ok(target) => target,
            Err(e) => {
                send_reply(stream, Reply::new(ReplyCode::GeneralFailure)).await;
                return Err(e);
            }
        };

        let reply = Reply::success().to_bytes();
        stream
            .write_all(&reply)
            .await
            .map_err(|e| ProxyError::Protocol(format!("failed to send reply: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| ProxyError::Protocol(format!("failed to send reply: {}", e)))?;

        Ok((target, request))
    }

    /// Parse a request
    ///
    /// ```text
    /// +----+-----+-------+------+----------+----------+
    /// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
    /// +----+-----+-------+------+----------+----------+
    /// | 1  |  1  | X'00' |  1   | Variable |    2     |
    /// +----+-----+-------+------+----------+----------+
    /// ```
    pub async fn read_request<S>(&self, stream: &mut S) -> ProxyResult<Request>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let version = read_byte(stream, "version").await?;
        if version != SOCKS5_VERSION {
            send_frame(stream, &[SOCKS5_VERSION, SOCKS5_REPLY_VERSION_MISMATCH]).await;
            return Err(ProxyError::Protocol(format!(
                "invalid SOCKS version in request: {}",
                version
            )));
        }

        let command = Command::from(read_byte(stream, "command").await?);
        let _reserved = read_byte(stream, "reserved field").await?;
        let address_type = read_byte(stream, "address type").await?;

        let target = match address_type {
            SOCKS5_ADDR_IPV4 => {
                let mut octets = [0u8; 4];
                stream
                    .read_exact(&mut octets)
                    .await
                    .map_err(|e| ProxyError::Protocol(format!("failed to read IPv4 address: {}", e)))?;
                TargetAddr::Ipv4(Ipv4Addr::from(octets))
            }
            SOCKS5_ADDR_DOMAIN => {
                let len = read_byte(stream, "domain length").await? as usize;
                if len == 0 {
                    return Err(ProxyError::Protocol(
                        "domain name length cannot be zero".to_string(),
                    ));
                }

                let mut name = vec![0u8; len];
                stream
                    .read_exact(&mut name)
                    .await
                    .map_err(|e| ProxyError::Protocol(format!("failed to read domain name: {}", e)))?;

                if !name.is_ascii() {
                    return Err(ProxyError::Protocol(
                        "domain name is not ASCII".to_string(),
                    ));
                }
                // ASCII is valid UTF-8
                TargetAddr::Domain(String::from_utf8_lossy(&name).into_owned())
            }
            SOCKS5_ADDR_IPV6 => {
                send_reply(stream, Reply::new(ReplyCode::AddressTypeNotSupported)).await;
                return Err(ProxyError::Protocol(
                    "IPv6 destinations are not supported".to_string(),
                ));
            }
            other => {
                send_reply(stream, Reply::new(ReplyCode::AddressTypeNotSupported)).await;
                return Err(ProxyError::Protocol(format!(
                    "unsupported address type: {:#04x}",
                    other
                )));
            }
        };

        let mut port = [0u8; 2];
        stream
            .read_exact(&mut port)
            .await
            .map_err(|e| ProxyError::Protocol(format!("failed to read port: {}", e)))?;

        Ok(Request {
            command,
            target,
            port: u16::from_be_bytes(port),
        })
    }

    /// Open a TCP connection to the request's destination, trying every
    /// resolved address in order.
    pub async fn connect_to_target(&self, request: &Request) -> ProxyResult<TcpStream> {
        let destination = request.destination();
        let addrs = self.resolve(request).await.map_err(|source| ProxyError::Dial {
            target: destination.clone(),
            source,
        })?;

        let mut last_error = None;
        for addr in addrs {
            match self.try_connect(addr).await {
                Ok(stream) => {
                    info!(target = %destination, addr = %addr, "Connected to destination");
                    return Ok(stream);
                }
                Err(e) => {
                    warn!(addr = %addr, error = %e, "Failed to connect");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(source) => Err(ProxyError::Dial {
                target: destination,
                source,
            }),
            None => Err(ProxyError::Dial {
                target: destination,
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
            }),
        }
    }

    async fn resolve(&self, request: &Request) -> io::Result<Vec<SocketAddr>> {
        match &request.target {
            TargetAddr::Ipv4(ip) => Ok(vec![SocketAddr::from((*ip, request.port))]),
            TargetAddr::Domain(domain) => {
                let addrs: Vec<SocketAddr> = lookup_host((domain.as_str(), request.port))
                    .await?
                    .collect();
                debug!(domain = %domain, count = addrs.len(), "Resolved destination");
                Ok(addrs)
            }
        }
    }

    async fn try_connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        match self.connect_timeout {
            Some(limit) => match timeout(limit, TcpStream::connect(addr)).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", limit),
                )),
            },
            None => TcpStream::connect(addr).await,
        }
    }
}

async fn read_byte<S>(stream: &mut S, field: &str) -> ProxyResult<u8>
where
    S: AsyncRead + Unpin,
{
    stream
        .read_u8()
        .await
        .map_err(|e| ProxyError::Protocol(format!("failed to read {}: {}", field, e)))
}

/// Write an error reply; the session is failing anyway, so a broken client
/// connection is only logged.
async fn send_reply<S>(stream: &mut S, reply: Reply)
where
    S: AsyncWrite + Unpin,
{
    send_frame(stream, &reply.to_bytes()).await;
}

async fn send_frame<S>(stream: &mut S, frame: &[u8])
where
    S: AsyncWrite + Unpin,
{
    let result = match stream.write_all(frame).await {
        Ok(()) => stream.flush().await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        debug!(error = %e, "Failed to send reply");
    }
}
