//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS connection
//!     → server.rs (hyper HTTP/1.1 with upgrades, Axum router)
//!     → request.rs (request ID, tracing span)
//!     → routing (exact path match)
//!         /wss  → websocket.rs (validate handshake, 101, echo session)
//!               → 426 Upgrade required on any handshake failure
//!         other → response.rs (200 "Node App\n")
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::{build_router, AppState, HttpServer};
pub use websocket::{HandshakeError, UpgradeRequest};
