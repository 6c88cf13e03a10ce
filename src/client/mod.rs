//! WebSocket client subsystem.
//!
//! # Data Flow
//! ```text
//! ClientConfig + TrustConfiguration
//!     → connector.rs (TCP → TLS → WebSocket handshake)
//!     → session::run_session with a SessionHandler (session.rs by default)
//!     → returns when the connection closes; no reconnect
//! ```

pub mod connector;
pub mod session;

use crate::config::ClientConfig;
use crate::net::tls::TrustConfiguration;
use crate::session::{run_session, SessionHandler};

pub use connector::{connect, ClientError, ClientStream, Endpoint};
pub use session::TimestampSession;

/// Connect and drive `handler` until the connection closes.
pub async fn run<H: SessionHandler>(
    config: &ClientConfig,
    trust: &TrustConfiguration,
    handler: H,
) -> Result<(), ClientError> {
    let conn = connect(config, trust).await?;
    run_session(conn, handler).await;
    Ok(())
}
