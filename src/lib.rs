//! TLS WebSocket echo server and timestamp client.
//!
//! # Architecture Overview
//!
//! ```text
//!   wss-client                                   wss-echo
//!  ┌──────────────────────┐                     ┌───────────────────────────────────┐
//!  │ client::connector    │── TCP + TLS ───────▶│ net::listener (limit, handshake)  │
//!  │   (rustls roots or   │                     │   → http::server (hyper + axum)   │
//!  │    no verification)  │── GET /wss ────────▶│   → routing (/wss or static page) │
//!  │                      │◀─ 101 ──────────────│   → http::websocket (handshake)   │
//!  │ client::session      │                     │                                   │
//!  │   TimestampSession   │⇄ text frames ⇄      │ session::EchoSession              │
//!  └──────────┬───────────┘                     └────────────────┬──────────────────┘
//!             └──────── session::run_session + net::connection ──┘
//! ```

// Core subsystems
pub mod client;
pub mod config;
pub mod http;
pub mod net;
pub mod routing;
pub mod session;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::EchoConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use net::tls::TrustConfiguration;
