//! Server side session: greet, then echo every text message.

use crate::session::{Message, SessionHandler};

/// Sent once as soon as a connection opens.
pub const SERVER_GREETING: &str = "Hello there!";

/// Prepended to every echoed payload.
pub const ECHO_PREFIX: &str = "Echo: ";

/// Replies to each inbound message with `"Echo: " + payload`.
#[derive(Debug, Default)]
pub struct EchoSession {
    echoed: u64,
}

impl EchoSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages echoed so far.
    pub fn echoed(&self) -> u64 {
        self.echoed
    }
}

impl SessionHandler for EchoSession {
    fn on_open(&mut self) -> Vec<Message> {
        vec![Message::text(SERVER_GREETING)]
    }

    fn on_message(&mut self, message: &Message) -> Option<Message> {
        self.echoed += 1;
        Some(Message::text(format!("{}{}", ECHO_PREFIX, message)))
    }

    fn on_close(&mut self) {
        tracing::debug!(echoed = self.echoed, "Echo session finished");
    }
}
