//! Transport layer for the client.
//!
//! Transports marshal bytes only; correlation, validation and lifecycle
//! live in the client core. Duplex transports (stream, WebSocket)
//! deliver inbound frames through an event channel; the HTTP transport
//! is a request/response cycle and returns the body inline.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ClientResult;

pub mod http;
pub mod tcp;
pub mod ws;

pub use http::HttpTransport;
pub use tcp::TcpTransport;
pub use ws::WsTransport;

/// Inbound events from a duplex transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// One complete frame (delimiter stripped).
    Frame(String),
    /// The peer closed the connection.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Http,
    Ws,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Tcp => write!(f, "tcp"),
            TransportKind::Http => write!(f, "http"),
            TransportKind::Ws => write!(f, "ws"),
        }
    }
}

#[async_trait]
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Stateless transports open a fresh exchange per call and have no
    /// Connecting/Open distinction.
    fn is_stateless(&self) -> bool {
        matches!(self.kind(), TransportKind::Http)
    }

    async fn connect(&mut self) -> ClientResult<()>;

    async fn close(&mut self) -> ClientResult<()>;

    fn is_connected(&self) -> bool;

    /// Write one payload.
    ///
    /// Duplex transports return `None`; replies arrive via
    /// [`Transport::take_events`]. HTTP returns `Some(body)`, or `None`
    /// for a 204 acknowledgment.
    async fn send(&mut self, payload: &str) -> ClientResult<Option<String>>;

    /// Take the inbound event stream. Yields once per successful
    /// `connect` on duplex transports; `None` for HTTP.
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;
}

/// Type alias for a boxed transport.
pub type BoxedTransport = Box<dyn Transport>;
