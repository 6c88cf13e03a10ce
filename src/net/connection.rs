//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Track connection state (Connecting → Open → Closing → Closed)
//! - Generate unique connection IDs for tracing
//! - Own the transport exclusively and release it on close
//! - Count open sessions so tests and shutdown can observe them

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::session::transport::{Frame, Transport, TransportError};
use crate::session::Message;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
///
/// Ordered: a connection only ever moves to a later variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    /// Handshake finished, session not started yet.
    Connecting,
    /// Messages may be sent and received.
    Open,
    /// Close frame exchanged, waiting for the transport to finish.
    Closing,
    /// Transport released.
    Closed,
}

/// An upgraded WebSocket connection owned by exactly one session loop.
pub struct Connection<T> {
    id: ConnectionId,
    state: ConnectionState,
    remote: String,
    transport: Option<T>,
}

impl<T: Transport> Connection<T> {
    /// Wrap a freshly upgraded transport. The connection starts in `Connecting`.
    pub fn new(id: ConnectionId, transport: T, remote: impl Into<String>) -> Self {
        Self {
            id,
            state: ConnectionState::Connecting,
            remote: remote.into(),
            transport: Some(transport),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Peer address or URL, for logging.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Move forward to `next`. Returns false (and changes nothing) if that
    /// would not be a forward transition.
    fn advance(&mut self, next: ConnectionState) -> bool {
        if next <= self.state {
            return false;
        }
        tracing::trace!(
            connection_id = %self.id,
            from = ?self.state,
            to = ?next,
            "Connection state change"
        );
        self.state = next;
        true
    }

    /// Mark the connection open. Only valid from `Connecting`.
    pub fn open(&mut self) -> bool {
        self.state == ConnectionState::Connecting && self.advance(ConnectionState::Open)
    }

    /// Send a message. Fails without touching the transport unless `Open`.
    pub async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        match (self.state, self.transport.as_mut()) {
            (ConnectionState::Open, Some(transport)) => transport.send(message).await,
            (state, _) => Err(TransportError::NotOpen(state)),
        }
    }

    /// Receive the next frame. Yields `None` once the connection is closed.
    pub async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        match (self.state, self.transport.as_mut()) {
            (ConnectionState::Open, Some(transport)) => transport.recv().await,
            _ => None,
        }
    }

    /// Close the connection from our side, sending a close frame if the
    /// transport is still usable.
    ///
    /// Returns true only for the call that actually closed the connection;
    /// later calls are no-ops.
    pub async fn close(&mut self) -> bool {
        if !self.advance(ConnectionState::Closing) {
            return false;
        }
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                tracing::debug!(connection_id = %self.id, error = %e, "Close frame not delivered");
            }
        }
        self.advance(ConnectionState::Closed)
    }

    /// Record that the transport went away underneath us (peer close or
    /// error). Drops the transport without sending anything.
    ///
    /// Returns true only the first time.
    pub fn mark_closed(&mut self) -> bool {
        self.transport = None;
        self.advance(ConnectionState::Closed)
    }
}

impl<T> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("remote", &self.remote)
            .finish()
    }
}

/// Tracks open sessions.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    /// Current count of active connections.
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::transport::mock::MockTransport;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.to_string(), format!("conn-{}", id1.as_u64()));
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);
        assert_ne!(guard1.id(), guard2.id());

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn states_only_move_forward() {
        let (transport, _peer) = MockTransport::pair();
        let mut conn = Connection::new(ConnectionId::new(), transport, "test");
        assert_eq!(conn.state(), ConnectionState::Connecting);

        assert!(conn.open());
        assert!(!conn.open());
        assert_eq!(conn.state(), ConnectionState::Open);

        assert!(conn.close().await);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!conn.open());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (transport, peer) = MockTransport::pair();
        let mut conn = Connection::new(ConnectionId::new(), transport, "test");
        conn.open();

        assert!(conn.close().await);
        assert!(!conn.close().await);
        assert!(!conn.mark_closed());
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(peer.close_frames(), 1);
    }

    #[tokio::test]
    async fn transport_loss_closes_exactly_once() {
        let (transport, peer) = MockTransport::pair();
        let mut conn = Connection::new(ConnectionId::new(), transport, "test");
        conn.open();
        drop(peer);

        assert!(conn.recv().await.is_none());
        assert!(conn.mark_closed());
        assert!(!conn.mark_closed());
        assert!(!conn.close().await);
    }

    #[tokio::test]
    async fn no_traffic_once_closed() {
        let (transport, mut peer) = MockTransport::pair();
        let mut conn = Connection::new(ConnectionId::new(), transport, "test");

        let err = conn.send(Message::text("early")).await.unwrap_err();
        assert!(matches!(err, TransportError::NotOpen(ConnectionState::Connecting)));

        conn.open();
        conn.mark_closed();
        let err = conn.send(Message::text("late")).await.unwrap_err();
        assert!(matches!(err, TransportError::NotOpen(ConnectionState::Closed)));
        assert!(conn.recv().await.is_none());
        assert!(peer.try_next_sent().is_none());
    }
}
