//! WebSocket session subsystem.
//!
//! # Data Flow
//! ```text
//! Upgraded transport (server) / connected stream (client)
//!     → transport.rs (Transport: recv / send / close)
//!     → net::connection (Connection: state machine, exclusive owner)
//!     → run_session (select over inbound frames and the optional ticker)
//!     → SessionHandler callbacks (echo.rs on the server, client::session)
//! ```
//!
//! # Design Decisions
//! - One task owns a connection; sends and receives are sequential
//! - Replies are sent before the next frame is read, so order is preserved
//! - Errors close the affected connection only
//! - The ticker lives inside the loop and stops with the connection

pub mod echo;
pub mod transport;

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::net::connection::Connection;
use crate::session::transport::{Frame, Transport, TransportError};

pub use echo::EchoSession;

/// A text message carried over a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: String,
}

impl Message {
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.payload
    }

    pub fn into_payload(self) -> String {
        self.payload
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.payload)
    }
}

/// Per-connection behaviour plugged into [`run_session`].
pub trait SessionHandler: Send {
    /// Messages sent right after the connection opens.
    fn on_open(&mut self) -> Vec<Message> {
        Vec::new()
    }

    /// Handle one inbound message, optionally producing a reply.
    fn on_message(&mut self, message: &Message) -> Option<Message>;

    /// Period of the ticker, if this handler wants one.
    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    /// Called on every tick.
    fn on_tick(&mut self) -> Option<Message> {
        None
    }

    /// Called once, after the connection reached `Closed`.
    fn on_close(&mut self) {}

    /// Called when a transport error ends the session.
    fn on_error(&mut self, _error: &TransportError) {}
}

enum Event {
    Frame(Option<Result<Frame, TransportError>>),
    Tick,
}

/// Drive a connection until it closes.
///
/// Opens the connection, sends the handler's greeting and then alternates
/// between inbound frames and ticks. Any transport error is logged, handed to
/// the handler and closes the connection without further sends.
pub async fn run_session<T, H>(mut conn: Connection<T>, mut handler: H)
where
    T: Transport,
    H: SessionHandler,
{
    conn.open();
    tracing::info!(connection_id = %conn.id(), remote = %conn.remote(), "Connection open");

    let mut ticker = handler.tick_interval().map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    let mut outcome = Ok(());
    for message in handler.on_open() {
        outcome = conn.send(message).await;
        if outcome.is_err() {
            break;
        }
    }

    while outcome.is_ok() {
        let event = tokio::select! {
            frame = conn.recv() => Event::Frame(frame),
            _ = next_tick(&mut ticker) => Event::Tick,
        };

        match event {
            Event::Frame(Some(Ok(Frame::Text(message)))) => {
                tracing::debug!(connection_id = %conn.id(), len = message.as_str().len(), "Message received");
                if let Some(reply) = handler.on_message(&message) {
                    outcome = conn.send(reply).await;
                }
            }
            Event::Frame(Some(Ok(Frame::Ignored(kind)))) => {
                tracing::debug!(connection_id = %conn.id(), kind, "Ignoring frame");
            }
            Event::Frame(Some(Ok(Frame::Close))) => {
                tracing::debug!(connection_id = %conn.id(), "Peer sent close frame");
                conn.close().await;
                break;
            }
            Event::Frame(Some(Err(e))) => outcome = Err(e),
            Event::Frame(None) => {
                tracing::debug!(connection_id = %conn.id(), "Transport ended");
                break;
            }
            Event::Tick => {
                if let Some(message) = handler.on_tick() {
                    outcome = conn.send(message).await;
                }
            }
        }
    }

    if let Err(e) = &outcome {
        tracing::error!(connection_id = %conn.id(), error = %e, "Connection error");
        handler.on_error(e);
    }
    conn.mark_closed();
    handler.on_close();
    tracing::info!(connection_id = %conn.id(), remote = %conn.remote(), "Connection closed");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::net::connection::ConnectionId;
    use crate::session::transport::mock::MockTransport;

    #[derive(Default, Clone)]
    struct Log(Arc<Mutex<Vec<String>>>);

    impl Log {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct Ticking {
        log: Log,
        ticks: usize,
    }

    impl SessionHandler for Ticking {
        fn on_message(&mut self, message: &Message) -> Option<Message> {
            self.log.push(format!("message {}", message));
            None
        }

        fn tick_interval(&self) -> Option<Duration> {
            Some(Duration::from_millis(10))
        }

        fn on_tick(&mut self) -> Option<Message> {
            self.ticks += 1;
            Some(Message::text(format!("tick {}", self.ticks)))
        }

        fn on_close(&mut self) {
            self.log.push("close");
        }

        fn on_error(&mut self, _error: &TransportError) {
            self.log.push("error");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_sends_until_closed() {
        let (transport, mut peer) = MockTransport::pair();
        let log = Log::default();
        let handler = Ticking { log: log.clone(), ticks: 0 };
        let conn = Connection::new(ConnectionId::new(), transport, "mock");
        let session = tokio::spawn(run_session(conn, handler));

        assert_eq!(peer.next_sent().await.unwrap().as_str(), "tick 1");
        assert_eq!(peer.next_sent().await.unwrap().as_str(), "tick 2");
        peer.send_text("hi");
        peer.send_frame(Frame::Close);
        session.await.unwrap();

        assert_eq!(log.entries(), vec!["message hi", "close"]);
        assert_eq!(peer.close_frames(), 1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        while let Some(message) = peer.try_next_sent() {
            assert!(message.as_str().starts_with("tick"));
        }
        assert!(peer.try_next_sent().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_reports_once_and_stops() {
        let (transport, mut peer) = MockTransport::pair();
        let log = Log::default();
        let handler = Ticking { log: log.clone(), ticks: 0 };
        let conn = Connection::new(ConnectionId::new(), transport, "mock");

        peer.fail();
        run_session(conn, handler).await;

        assert_eq!(log.entries(), vec!["error", "close"]);
        assert_eq!(peer.close_frames(), 0);
        assert!(peer.try_next_sent().is_none());
    }
}
