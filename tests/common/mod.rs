//! Test utilities shared by the integration tests

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use socks5_proxy::config::Config;
use socks5_proxy::logging::Logger;
use socks5_proxy::ConnectionManager;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::fmt::MakeWriter;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Create a connected TCP stream pair for testing
pub async fn create_tcp_stream_pair() -> (TcpStream, TcpStream) {
    let (listener, addr) = create_test_listener().await;

    let connect_fut = TcpStream::connect(addr);
    let accept_fut = listener.accept();

    let (client_stream, accepted) = tokio::join!(connect_fut, accept_fut);

    (client_stream.unwrap(), accepted.unwrap().0)
}

/// Start a TCP echo server; every accepted connection is echoed until EOF
pub async fn start_echo_server() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

/// Get a local port nothing is listening on
pub async fn closed_port() -> u16 {
    let (listener, addr) = create_test_listener().await;
    drop(listener);
    addr.port()
}

/// Start a proxy for `config` on an ephemeral port
pub async fn start_proxy(config: Config) -> (Arc<ConnectionManager>, SocketAddr) {
    start_proxy_with_logger(config, Logger::disabled()).await
}

/// Start a proxy that reports to `logger`
pub async fn start_proxy_with_logger(
    mut config: Config,
    logger: Logger,
) -> (Arc<ConnectionManager>, SocketAddr) {
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;

    let manager = Arc::new(ConnectionManager::bind(&config, logger).await.unwrap());
    let addr = manager.local_addr().unwrap();

    let runner = Arc::clone(&manager);
    tokio::spawn(async move { runner.run().await });

    (manager, addr)
}

/// Send a client hello and return the server's method selection
pub async fn greet(stream: &mut TcpStream, methods: &[u8]) -> [u8; 2] {
    let mut hello = vec![0x05, methods.len() as u8];
    hello.extend_from_slice(methods);
    stream.write_all(&hello).await.unwrap();

    let mut selection = [0u8; 2];
    stream.read_exact(&mut selection).await.unwrap();
    selection
}

/// Send a username/password sub-negotiation and return the status frame
pub async fn send_credentials(stream: &mut TcpStream, username: &[u8], password: &[u8]) -> [u8; 2] {
    let mut request = vec![username.len() as u8];
    request.extend_from_slice(username);
    request.push(password.len() as u8);
    request.extend_from_slice(password);
    stream.write_all(&request).await.unwrap();

    let mut status = [0u8; 2];
    stream.read_exact(&mut status).await.unwrap();
    status
}

/// Build a request for an IPv4 destination
pub fn ipv4_request(command: u8, addr: SocketAddr) -> Vec<u8> {
    let ip = match addr {
        SocketAddr::V4(v4) => *v4.ip(),
        SocketAddr::V6(_) => panic!("IPv4 address expected"),
    };
    let mut request = vec![0x05, command, 0x00, 0x01];
    request.extend_from_slice(&ip.octets());
    request.extend_from_slice(&addr.port().to_be_bytes());
    request
}

/// Build a request for a domain destination
pub fn domain_request(command: u8, domain: &str, port: u16) -> Vec<u8> {
    let mut request = vec![0x05, command, 0x00, 0x03, domain.len() as u8];
    request.extend_from_slice(domain.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    request
}

/// Send a request and return the 10-byte reply
pub async fn send_request(stream: &mut TcpStream, request: &[u8]) -> [u8; 10] {
    stream.write_all(request).await.unwrap();
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    reply
}

/// Reply with the given status and a zero-filled bound address
pub fn reply_with(status: u8) -> [u8; 10] {
    [0x05, status, 0x00, 0x01, 0, 0, 0, 0, 0, 0]
}

/// Log sink that keeps everything written to it in memory
#[derive(Clone, Default)]
pub struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything logged so far
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
