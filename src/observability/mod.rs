//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with connection_id / request_id fields
//!
//! Consumers:
//!     → logging.rs (fmt subscriber on stdout, EnvFilter)
//! ```

pub mod logging;
