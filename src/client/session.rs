//! Client side session: greet once, then send a timestamp on every tick.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};

use crate::session::{Message, SessionHandler};

/// Sent once as soon as the connection opens.
pub const CLIENT_GREETING: &str = "Hello from Client!";

/// Prepended to every periodic message.
pub const TIMESTAMP_PREFIX: &str = "Timestamp: ";

/// Current UTC time in ISO-8601 with millisecond precision, e.g.
/// `2024-05-01T12:00:00.000Z`.
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Logs every inbound message and sends `"Timestamp: " + now` every
/// `interval`.
#[derive(Debug, Clone)]
pub struct TimestampSession {
    interval: Duration,
    received: u64,
}

impl TimestampSession {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            received: 0,
        }
    }

    /// Number of messages received so far.
    pub fn received(&self) -> u64 {
        self.received
    }
}

impl SessionHandler for TimestampSession {
    fn on_open(&mut self) -> Vec<Message> {
        vec![Message::text(CLIENT_GREETING)]
    }

    fn on_message(&mut self, message: &Message) -> Option<Message> {
        self.received += 1;
        tracing::info!("received: {}", message);
        None
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(self.interval)
    }

    fn on_tick(&mut self) -> Option<Message> {
        Some(Message::text(format!("{}{}", TIMESTAMP_PREFIX, iso_timestamp())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn timestamp_is_iso_8601_utc() {
        let ts = iso_timestamp();
        assert!(ts.ends_with('Z'), "{ts}");
        assert_eq!(ts.len(), "2024-05-01T12:00:00.000Z".len());
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn greets_then_ticks() {
        let mut session = TimestampSession::new(Duration::from_millis(2000));
        assert_eq!(session.on_open(), vec![Message::text("Hello from Client!")]);
        assert_eq!(session.tick_interval(), Some(Duration::from_secs(2)));

        let tick = session.on_tick().unwrap();
        let ts = tick.as_str().strip_prefix("Timestamp: ").unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn inbound_messages_are_only_logged() {
        let mut session = TimestampSession::new(Duration::from_secs(2));
        assert_eq!(session.on_message(&Message::text("Echo: hi")), None);
        assert_eq!(session.received(), 1);
    }
}
