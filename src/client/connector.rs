//! Client side TLS connection and WebSocket handshake.

use std::net::IpAddr;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{self, pki_types::ServerName};
use tokio_rustls::TlsConnector;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::WebSocketStream;
use url::Url;

use crate::config::ClientConfig;
use crate::net::connection::{Connection, ConnectionId};
use crate::net::tls::{peer_validation_failure, CertificateError, TrustConfiguration};

/// The stream type of an established client connection.
pub type ClientStream = WebSocketStream<TlsStream<TcpStream>>;

/// Errors while establishing a client connection.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server address {0:?}")]
    InvalidAddress(String),

    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server certificate rejected: {0}")]
    PeerValidation(rustls::Error),

    #[error("TLS handshake failed: {0}")]
    Tls(#[source] std::io::Error),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),

    #[error(transparent)]
    Certificate(#[from] CertificateError),
}

/// Target of a client connection, derived from the configured address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// `wss://` URL used for the upgrade request.
    pub url: String,
}

impl Endpoint {
    /// Parse a `wss://` or `https://` address. `https` is rewritten to `wss`.
    pub fn parse(address: &str) -> Result<Self, ClientError> {
        let invalid = || ClientError::InvalidAddress(address.to_string());
        let mut url = Url::parse(address).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "wss" | "https") {
            return Err(invalid());
        }
        url.set_scheme("wss").map_err(|_| invalid())?;

        let host = url
            .host_str()
            .ok_or_else(invalid)?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url.port_or_known_default().unwrap_or(443);

        Ok(Self {
            host,
            port,
            url: url.to_string(),
        })
    }

    fn server_name(&self) -> Result<ServerName<'static>, ClientError> {
        match self.host.parse::<IpAddr>() {
            Ok(ip) => Ok(ServerName::IpAddress(ip.into())),
            Err(_) => ServerName::try_from(self.host.clone())
                .map_err(|_| ClientError::InvalidAddress(self.host.clone())),
        }
    }
}

/// Connect to the server: TCP, then TLS, then the WebSocket handshake.
///
/// The returned connection is in `Connecting` state; `run_session` opens it.
pub async fn connect(
    config: &ClientConfig,
    trust: &TrustConfiguration,
) -> Result<Connection<ClientStream>, ClientError> {
    let endpoint = Endpoint::parse(&config.server_address)?;
    let connector = TlsConnector::from(trust.client_config()?);
    if trust.skip_peer_validation {
        tracing::warn!("Server certificate validation is disabled");
    }

    let address = format!("{}:{}", endpoint.host, endpoint.port);
    let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|source| ClientError::Connect {
            address: address.clone(),
            source,
        })?;

    let tls = connector
        .connect(endpoint.server_name()?, tcp)
        .await
        .map_err(|e| match peer_validation_failure(&e) {
            Some(reason) => ClientError::PeerValidation(reason.clone()),
            None => ClientError::Tls(e),
        })?;
    tracing::debug!(address = %address, "TLS handshake complete");

    // Under TLS 1.3 a rejected client certificate only shows up on the first read.
    let (socket, response) = tokio_tungstenite::client_async(endpoint.url.as_str(), tls)
        .await
        .map_err(handshake_failure)?;
    tracing::debug!(status = %response.status(), url = %endpoint.url, "WebSocket handshake complete");

    Ok(Connection::new(ConnectionId::new(), socket, endpoint.url))
}

fn handshake_failure(err: tungstenite::Error) -> ClientError {
    let reason = match &err {
        tungstenite::Error::Io(e) => peer_validation_failure(e).cloned(),
        _ => None,
    };
    match reason {
        Some(reason) => ClientError::PeerValidation(reason),
        None => ClientError::Handshake(err),
    }
}
