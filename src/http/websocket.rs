//! WebSocket handshake handling.
//!
//! # Responsibilities
//! - Validate upgrade requests (method, Connection, Upgrade, version, key)
//! - Complete the upgrade (101 Switching Protocols) through axum
//! - Hand the upgraded socket to an echo session
//!
//! # Design Decisions
//! - A failed handshake is terminal for that request; it is answered with
//!   426 and never retried
//! - Validation runs on our side first so every failure maps to a typed
//!   `HandshakeError` before axum's own checks

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;

use crate::http::response;
use crate::net::connection::{Connection, ConnectionTracker};
use crate::session::{run_session, EchoSession};

/// The only WebSocket version we speak (RFC 6455).
pub const WEBSOCKET_VERSION: &str = "13";

/// Reasons an upgrade request is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("Upgrade requires GET, got {0}")]
    Method(Method),

    #[error("Connection header does not request an upgrade")]
    ConnectionHeader,

    #[error("Upgrade header is not `websocket`")]
    UpgradeHeader,

    #[error("Unsupported Sec-WebSocket-Version")]
    Version,

    #[error("Missing or malformed Sec-WebSocket-Key")]
    Key,

    #[error("Connection cannot be upgraded")]
    NotUpgradable,
}

impl IntoResponse for HandshakeError {
    fn into_response(self) -> Response {
        response::upgrade_required()
    }
}

fn header_has_token(headers: &HeaderMap, name: header::HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

/// Check the upgrade signalling of a request.
///
/// Returns the `Sec-WebSocket-Accept` token the 101 response must carry.
pub fn validate_upgrade(method: &Method, headers: &HeaderMap) -> Result<String, HandshakeError> {
    if method != Method::GET {
        return Err(HandshakeError::Method(method.clone()));
    }
    if !header_has_token(headers, header::CONNECTION, "upgrade") {
        return Err(HandshakeError::ConnectionHeader);
    }
    if !header_has_token(headers, header::UPGRADE, "websocket") {
        return Err(HandshakeError::UpgradeHeader);
    }
    if headers.get(header::SEC_WEBSOCKET_VERSION).map(|v| v.as_bytes())
        != Some(WEBSOCKET_VERSION.as_bytes())
    {
        return Err(HandshakeError::Version);
    }

    let key = headers
        .get(header::SEC_WEBSOCKET_KEY)
        .ok_or(HandshakeError::Key)?;
    match STANDARD.decode(key.as_bytes()) {
        Ok(nonce) if nonce.len() == 16 => Ok(derive_accept_key(key.as_bytes())),
        _ => Err(HandshakeError::Key),
    }
}

/// A validated upgrade request, ready to be switched to a WebSocket.
pub struct UpgradeRequest {
    upgrade: WebSocketUpgrade,
    accept_key: String,
}

impl UpgradeRequest {
    /// Answer with 101 and run an echo session on the upgraded socket.
    pub fn into_echo_session(self, tracker: ConnectionTracker, peer: Option<SocketAddr>) -> Response {
        let remote = peer.map_or_else(|| "unknown".to_string(), |p| p.to_string());
        tracing::debug!(remote = %remote, accept_key = %self.accept_key, "Switching protocols");

        self.upgrade
            .on_failed_upgrade(|e| tracing::warn!(error = %e, "WebSocket upgrade failed"))
            .on_upgrade(move |socket| async move {
                let guard = tracker.track();
                let conn = Connection::new(guard.id(), socket, remote);
                run_session(conn, EchoSession::new()).await;
            })
    }
}

impl<S> FromRequestParts<S> for UpgradeRequest
where
    S: Send + Sync,
{
    type Rejection = HandshakeError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let accept_key = validate_upgrade(&parts.method, &parts.headers)?;
        let upgrade = WebSocketUpgrade::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(reason = %rejection.body_text(), "Upgrade rejected by axum");
                HandshakeError::NotUpgradable
            })?;

        Ok(Self {
            upgrade,
            accept_key,
        })
    }
}
