//! Fixed plain-text responses.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// Body served for every path other than the upgrade path.
pub const PLAIN_BODY: &str = "Node App\n";

/// Body served when the upgrade path is hit without a valid handshake.
pub const UPGRADE_REQUIRED_BODY: &str = "Upgrade required";

/// `200 OK` with the static page.
pub fn plain_page() -> Response {
    (StatusCode::OK, PLAIN_BODY).into_response()
}

/// `426 Upgrade Required`, advertising the protocol the client should use.
pub fn upgrade_required() -> Response {
    (
        StatusCode::UPGRADE_REQUIRED,
        [(header::UPGRADE, "websocket")],
        UPGRADE_REQUIRED_BODY,
    )
        .into_response()
}
