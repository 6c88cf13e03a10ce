//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server
//! and the client. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

/// Root configuration shared by the `wss-echo` server and `wss-client`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EchoConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Server certificate, key and trust store.
    pub tls: TlsConfig,

    /// Client session settings.
    pub client: ClientConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,

    /// Certificate authorities trusted to sign client certificates (PEM).
    pub ca_path: Option<String>,

    /// Accept clients without verifying their certificate chain.
    pub skip_peer_validation: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: "/temp/vm_cert.pem".to_string(),
            key_path: "/temp/vm_key.pem".to_string(),
            ca_path: None,
            skip_peer_validation: true,
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server URL; `https` and `wss` schemes are accepted.
    pub server_address: String,

    /// Certificate authorities trusted to sign the server certificate (PEM).
    pub ca_path: Option<String>,

    /// Optional client certificate presented to servers requiring one.
    pub cert_path: Option<String>,

    /// Private key matching `cert_path`.
    pub key_path: Option<String>,

    /// Accept any server certificate.
    pub skip_peer_validation: bool,

    /// Delay between timestamp messages in milliseconds.
    pub interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: "https://0.0.0.0:8000/wss".to_string(),
            ca_path: Some("/temp/vm_cert.pem".to_string()),
            cert_path: None,
            key_path: None,
            skip_peer_validation: true,
            interval_ms: 2000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Maximum time allowed for a TLS handshake in seconds.
    pub handshake_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { handshake_secs: 10 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
