//! TLS listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to configured address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Run the TLS handshake under a deadline, dropping connections that fail it

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::config::ListenerConfig;
use crate::net::tls::peer_validation_failure;

/// Pause after an accept error that is not tied to a single connection
/// (for example running out of file descriptors).
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Invalid bind address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Connection limiter closed")]
    LimiterClosed,
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr =
            config
                .bind_address
                .parse()
                .map_err(|source| ListenerError::Address {
                    address: config.bind_address.clone(),
                    source,
                })?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached.
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::LimiterClosed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}

/// Errors that only affect the connection being accepted.
fn is_connection_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
    )
}

/// Log a failed accept and wait before the next one unless the error was
/// specific to that connection.
pub async fn accept_backoff(e: &std::io::Error) {
    if is_connection_error(e) {
        tracing::debug!(error = %e, "Accept failed");
        return;
    }
    tracing::warn!(error = %e, backoff = ?ACCEPT_ERROR_BACKOFF, "Accept failed");
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

/// Run the server side TLS handshake.
///
/// Returns `None` when the handshake fails or times out; the connection is
/// then simply dropped. Untrusted client certificates are logged at warn,
/// everything else at debug.
pub async fn tls_handshake(
    acceptor: &TlsAcceptor,
    stream: TcpStream,
    peer: SocketAddr,
    deadline: Duration,
) -> Option<TlsStream<TcpStream>> {
    match tokio::time::timeout(deadline, acceptor.accept(stream)).await {
        Ok(Ok(stream)) => {
            tracing::debug!(peer_addr = %peer, "TLS handshake complete");
            Some(stream)
        }
        Ok(Err(e)) => {
            match peer_validation_failure(&e) {
                Some(reason) => {
                    tracing::warn!(peer_addr = %peer, error = %reason, "Peer certificate rejected")
                }
                None => tracing::debug!(peer_addr = %peer, error = %e, "TLS handshake failed"),
            }
            None
        }
        Err(_) => {
            tracing::debug!(peer_addr = %peer, timeout = ?deadline, "TLS handshake timed out");
            None
        }
    }
}
