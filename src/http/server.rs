//! HTTP server setup and connection serving.
//!
//! # Responsibilities
//! - Create Axum Router with the dispatch handler
//! - Wire up middleware (tracing, request ID)
//! - Accept TLS connections and serve HTTP/1.1 with upgrades on each
//! - Stop accepting on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    response::{IntoResponse, Response},
    Router,
};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tower::Service;
use tower_http::trace::TraceLayer;

use crate::config::EchoConfig;
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer};
use crate::http::response;
use crate::http::websocket::UpgradeRequest;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{accept_backoff, tls_handshake, Listener, ListenerError};
use crate::net::tls::{CertificateError, TrustConfiguration};
use crate::routing::{route, RouteKind};

/// Application state injected into handlers.
#[derive(Clone, Default)]
pub struct AppState {
    pub tracker: ConnectionTracker,
}

/// TLS-terminated HTTP server with a single WebSocket endpoint.
pub struct HttpServer {
    router: Router,
    acceptor: TlsAcceptor,
    tracker: ConnectionTracker,
    handshake_timeout: Duration,
}

impl HttpServer {
    /// Create a new server. Fails if the TLS credentials are unusable.
    pub fn new(config: &EchoConfig, trust: &TrustConfiguration) -> Result<Self, CertificateError> {
        let acceptor = TlsAcceptor::from(trust.server_config()?);
        if trust.skip_peer_validation {
            tracing::warn!("Client certificate validation is disabled");
        }

        let tracker = ConnectionTracker::new();
        let router = build_router(AppState {
            tracker: tracker.clone(),
        });

        Ok(Self {
            router,
            acceptor,
            tracker,
            handshake_timeout: Duration::from_secs(config.timeouts.handshake_secs),
        })
    }

    /// Open WebSocket sessions.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires. Sessions already running are left to finish.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, "HTTPS server starting");

        let acceptor = Arc::new(self.acceptor);
        loop {
            let (stream, peer, permit) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(ListenerError::Accept(e)) => {
                        accept_backoff(&e).await;
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            };

            let acceptor = Arc::clone(&acceptor);
            let router = self.router.clone();
            let deadline = self.handshake_timeout;
            tokio::spawn(async move {
                let _permit = permit;
                if let Some(stream) = tls_handshake(&acceptor, stream, peer, deadline).await {
                    serve_connection(stream, peer, router).await;
                }
            });
        }

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(set_request_id_layer())
}

/// Serve HTTP/1.1 (with upgrades) on one TLS stream.
async fn serve_connection(stream: TlsStream<TcpStream>, peer: SocketAddr, router: Router) {
    let service = hyper::service::service_fn(move |mut request: hyper::Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        router.clone().call(request)
    });

    let result = http1::Builder::new()
        .timer(TokioTimer::new())
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades()
        .await;

    if let Err(e) = result {
        tracing::debug!(peer_addr = %peer, error = %e, "HTTP connection ended with error");
    }
}

/// Route every request: `/wss` to the handshake, everything else to the
/// static page.
async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    match route(request.uri().path()) {
        RouteKind::Plain => response::plain_page(),
        RouteKind::Upgrade => {
            let peer = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            let (mut parts, _body) = request.into_parts();

            match UpgradeRequest::from_request_parts(&mut parts, &state).await {
                Ok(upgrade) => upgrade.into_echo_session(state.tracker.clone(), peer),
                Err(e) => {
                    tracing::info!(error = %e, "Upgrade request refused");
                    e.into_response()
                }
            }
        }
    }
}
