//! Tests for the optional handshake deadline

mod common;

use common::*;
use socks5_proxy::Config;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

#[tokio::test]
async fn test_idle_client_is_dropped_after_handshake_timeout() {
    let mut config = Config::default();
    config.server.handshake_timeout = Some(Duration::from_millis(100));
    let (manager, proxy_addr) = start_proxy(config).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();

    // Send nothing; the proxy should give up and close
    let mut buf = Vec::new();
    let read = timeout(Duration::from_secs(5), client.read_to_end(&mut buf))
        .await
        .expect("proxy kept an idle client open");
    assert!(read.is_ok());
    assert!(buf.is_empty());

    assert_eq!(manager.wait_for_sessions(Duration::from_secs(5)).await, 0);
}

#[tokio::test]
async fn test_no_deadline_by_default() {
    let (manager, proxy_addr) = start_proxy(Config::default()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Still served after sitting idle
    assert_eq!(greet(&mut client, &[0x00]).await, [0x05, 0x00]);
    assert_eq!(manager.active_sessions(), 1);
}

#[tokio::test]
async fn test_relay_is_not_bounded_by_handshake_timeout() {
    let echo_addr = start_echo_server().await;
    let mut config = Config::default();
    config.server.handshake_timeout = Some(Duration::from_millis(200));
    let (_manager, proxy_addr) = start_proxy(config).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    greet(&mut client, &[0x00]).await;
    send_request(&mut client, &ipv4_request(0x01, echo_addr)).await;

    tokio::time::sleep(Duration::from_millis(400)).await;

    client.write_all(b"late").await.unwrap();
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"late");
}
