//! Frame transport abstraction over the two WebSocket stacks.
//!
//! The server side speaks through axum's `WebSocket`, the client through
//! tokio-tungstenite's `WebSocketStream`. Both are reduced to text messages,
//! close notifications and frames we do not act on.

use std::future::Future;

use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::WebSocketStream;

use crate::net::connection::ConnectionState;
use crate::session::Message;

/// An inbound WebSocket frame, as far as a session cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(Message),
    Close,
    /// Binary, ping, pong or raw frames. Control frames are answered by
    /// the WebSocket library itself.
    Ignored(&'static str),
}

/// Socket or protocol failure in the middle of a session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    Server(#[from] axum::Error),

    #[error("WebSocket error: {0}")]
    Client(#[from] tungstenite::Error),

    #[error("Connection is {0:?}")]
    NotOpen(ConnectionState),
}

/// Full-duplex frame I/O owned by a single session.
pub trait Transport: Send {
    /// Next inbound frame; `None` when the stream has ended.
    fn recv(&mut self) -> impl Future<Output = Option<Result<Frame, TransportError>>> + Send;

    fn send(&mut self, message: Message) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send a close frame and flush.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl Transport for WebSocket {
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        let message = StreamExt::next(self).await?;
        Some(message.map_err(TransportError::from).map(|message| match message {
            AxumMessage::Text(text) => Frame::Text(Message::text(text.as_str())),
            AxumMessage::Binary(_) => Frame::Ignored("binary"),
            AxumMessage::Ping(_) => Frame::Ignored("ping"),
            AxumMessage::Pong(_) => Frame::Ignored("pong"),
            AxumMessage::Close(_) => Frame::Close,
        }))
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        SinkExt::send(self, AxumMessage::Text(message.into_payload().into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        SinkExt::close(self).await?;
        Ok(())
    }
}

impl<S> Transport for WebSocketStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        let message = StreamExt::next(self).await?;
        Some(message.map_err(TransportError::from).map(|message| match message {
            WsMessage::Text(text) => Frame::Text(Message::text(text.as_str())),
            WsMessage::Binary(_) => Frame::Ignored("binary"),
            WsMessage::Ping(_) => Frame::Ignored("ping"),
            WsMessage::Pong(_) => Frame::Ignored("pong"),
            WsMessage::Frame(_) => Frame::Ignored("raw"),
            WsMessage::Close(_) => Frame::Close,
        }))
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        SinkExt::send(self, WsMessage::Text(message.into_payload().into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match SinkExt::close(self).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
