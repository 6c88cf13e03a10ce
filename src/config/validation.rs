//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (connection limit, interval, timeouts)
//! - Check that a trust store exists wherever peer validation is required
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EchoConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::EchoConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("listener.max_connections must be greater than zero")]
    MaxConnections,

    #[error("timeouts.handshake_secs must be greater than zero")]
    HandshakeTimeout,

    #[error("client.interval_ms must be greater than zero")]
    Interval,

    #[error("client.server_address {0:?} must be a wss:// or https:// URL")]
    ServerAddress(String),

    #[error("{0}.ca_path is required when peer validation is enabled")]
    MissingTrustStore(&'static str),

    #[error("client.cert_path and client.key_path must be set together")]
    PartialClientIdentity,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &EchoConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::MaxConnections);
    }
    if config.timeouts.handshake_secs == 0 {
        errors.push(ValidationError::HandshakeTimeout);
    }
    if config.client.interval_ms == 0 {
        errors.push(ValidationError::Interval);
    }

    let scheme_ok = Url::parse(&config.client.server_address)
        .map(|url| matches!(url.scheme(), "wss" | "https") && url.host_str().is_some())
        .unwrap_or(false);
    if !scheme_ok {
        errors.push(ValidationError::ServerAddress(
            config.client.server_address.clone(),
        ));
    }

    if !config.tls.skip_peer_validation && config.tls.ca_path.is_none() {
        errors.push(ValidationError::MissingTrustStore("tls"));
    }
    if !config.client.skip_peer_validation && config.client.ca_path.is_none() {
        errors.push(ValidationError::MissingTrustStore("client"));
    }
    if config.client.cert_path.is_some() != config.client.key_path.is_some() {
        errors.push(ValidationError::PartialClientIdentity);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
