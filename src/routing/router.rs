//! Route lookup.
//!
//! # Design Decisions
//! - Exact match on the path only; method, query and headers never matter
//! - Immutable (thread-safe without locks)

/// The one path that may be upgraded to a WebSocket.
pub const UPGRADE_PATH: &str = "/wss";

/// Where a request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// WebSocket handshake handling.
    Upgrade,
    /// Static plain-text page.
    Plain,
}

/// Decide how to handle a request from its path.
pub fn route(path: &str) -> RouteKind {
    if path == UPGRADE_PATH {
        RouteKind::Upgrade
    } else {
        RouteKind::Plain
    }
}
