//! Plain HTTP behaviour of the TLS listener.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;

use wss_echo::net::TrustConfiguration;

mod common;

const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

fn body(response: &str) -> &str {
    response.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
}

#[tokio::test]
async fn root_serves_static_page() {
    let server = common::start_server(common::server_config(true)).await;

    let response = common::https_request(
        server.addr,
        "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.to_ascii_lowercase().contains("x-request-id:"));
    assert_eq!(body(&response), "Node App\n");
    server.shutdown.trigger();
}

#[tokio::test]
async fn other_paths_ignore_upgrade_headers() {
    let server = common::start_server(common::server_config(true)).await;

    let response = common::https_request(
        server.addr,
        &format!(
            "GET /chat HTTP/1.1\r\nHost: localhost\r\nConnection: Upgrade, close\r\n\
             Upgrade: websocket\r\nSec-WebSocket-Version: 13\r\nSec-WebSocket-Key: {KEY}\r\n\r\n"
        ),
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert_eq!(body(&response), "Node App\n");
    server.shutdown.trigger();
}

#[tokio::test]
async fn upgrade_path_without_handshake_is_426() {
    let server = common::start_server(common::server_config(true)).await;

    for request in [
        "GET /wss HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        "POST /wss HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: 2\r\n\r\nhi",
    ] {
        let response = common::https_request(server.addr, request).await;
        assert!(response.starts_with("HTTP/1.1 426"), "{response}");
        assert_eq!(body(&response), "Upgrade required");
    }
    assert_eq!(server.tracker.active_count(), 0);
    server.shutdown.trigger();
}

#[tokio::test]
async fn valid_handshake_switches_protocols() {
    let server = common::start_server(common::server_config(true)).await;

    let trust =
        TrustConfiguration::for_client(&common::client_config(server.addr, "ca.pem")).unwrap();
    let connector = TlsConnector::from(trust.client_config().unwrap());
    let tcp = TcpStream::connect(server.addr).await.unwrap();
    let mut tls = connector
        .connect(ServerName::try_from("localhost").unwrap(), tcp)
        .await
        .unwrap();

    let request = format!(
        "GET /wss HTTP/1.1\r\nHost: localhost\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\nSec-WebSocket-Key: {KEY}\r\n\r\n"
    );
    tls.write_all(request.as_bytes()).await.unwrap();

    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        tokio::time::timeout(Duration::from_secs(5), tls.read_exact(&mut byte))
            .await
            .unwrap()
            .unwrap();
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap().to_ascii_lowercase();

    assert!(head.starts_with("http/1.1 101"), "{head}");
    let accept = derive_accept_key(KEY.as_bytes()).to_ascii_lowercase();
    assert!(head.contains(&format!("sec-websocket-accept: {accept}")), "{head}");

    assert!(common::eventually(Duration::from_secs(2), || server.tracker.active_count() == 1).await);
    drop(tls);
    assert!(common::eventually(Duration::from_secs(2), || server.tracker.active_count() == 0).await);
    server.shutdown.trigger();
}

#[tokio::test]
async fn failed_tls_handshake_does_not_stop_listener() {
    let server = common::start_server(common::server_config(true)).await;

    let mut plain = TcpStream::connect(server.addr).await.unwrap();
    plain
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut sink = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), plain.read_to_end(&mut sink)).await;
    assert!(read.is_ok(), "connection should be dropped");
    assert!(!String::from_utf8_lossy(&sink).contains("Node App"));

    let response = common::https_request(
        server.addr,
        "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(body(&response), "Node App\n");
    server.shutdown.trigger();
}
