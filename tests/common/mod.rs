//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use wss_echo::config::{ClientConfig, EchoConfig};
use wss_echo::net::{ConnectionTracker, Listener, TrustConfiguration};
use wss_echo::{HttpServer, Shutdown};

pub fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

/// Server config on an ephemeral localhost port using the fixture certificates.
pub fn server_config(skip_peer_validation: bool) -> EchoConfig {
    let mut config = EchoConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.tls.cert_path = fixture("server.pem");
    config.tls.key_path = fixture("server.key");
    config.tls.ca_path = Some(fixture("ca.pem"));
    config.tls.skip_peer_validation = skip_peer_validation;
    config.timeouts.handshake_secs = 2;
    config
}

/// Client config validating the server against `ca`.
pub fn client_config(addr: SocketAddr, ca: &str) -> ClientConfig {
    ClientConfig {
        server_address: format!("wss://localhost:{}/wss", addr.port()),
        ca_path: Some(fixture(ca)),
        cert_path: None,
        key_path: None,
        skip_peer_validation: false,
        interval_ms: 100,
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub tracker: ConnectionTracker,
    pub shutdown: Shutdown,
}

/// Start a server in the background.
pub async fn start_server(config: EchoConfig) -> TestServer {
    let trust = TrustConfiguration::for_server(&config.tls).unwrap();
    let server = HttpServer::new(&config, &trust).unwrap();
    let tracker = server.tracker();
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer {
        addr,
        tracker,
        shutdown,
    }
}

/// Send a raw HTTP/1.1 request over TLS and return everything the server
/// writes until it closes the connection.
pub async fn https_request(addr: SocketAddr, request: &str) -> String {
    let trust = TrustConfiguration::for_client(&client_config(addr, "ca.pem")).unwrap();
    let connector = TlsConnector::from(trust.client_config().unwrap());
    let tcp = TcpStream::connect(addr).await.unwrap();
    let domain = ServerName::try_from("localhost").unwrap();
    let mut tls = connector.connect(domain, tcp).await.unwrap();

    tls.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), tls.read_to_end(&mut response))
        .await
        .expect("server did not close the connection")
        .unwrap_or_default();
    String::from_utf8_lossy(&response).into_owned()
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
