//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (binaries):
//!     Load config → Validate → Load certificates → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Exit
//!
//! Signals (signals.rs):
//!     SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener starts last, after certificates have loaded

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_on_ctrl_c;
