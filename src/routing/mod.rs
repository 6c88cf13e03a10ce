//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (exact path lookup)
//!     → Return: RouteKind::Upgrade or RouteKind::Plain
//! ```

pub mod router;

pub use router::{route, RouteKind, UPGRADE_PATH};
