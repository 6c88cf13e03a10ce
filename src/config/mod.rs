//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI flags
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EchoConfig (validated, immutable)
//!     → passed by reference to the server and client constructors
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only the binaries look at the process environment

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ClientConfig, EchoConfig, ListenerConfig, ObservabilityConfig, TimeoutConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
