//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits, TLS handshake)
//!     → tls.rs (certificates, trust store, peer validation)
//!     → Hand off to HTTP layer
//!     → connection.rs (upgraded WebSocket: lifecycle, state machine)
//!
//! Connection States:
//!     Connecting → Open → Closing → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Handshake failures never reach the HTTP layer
//! - Trust configuration is loaded once and shared read-only

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{Connection, ConnectionId, ConnectionState, ConnectionTracker};
pub use listener::{Listener, ListenerError};
pub use tls::{CertificateError, TrustConfiguration};
