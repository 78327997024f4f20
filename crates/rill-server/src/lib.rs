//! # rill server
//!
//! JSON-RPC 2.0 server over three interchangeable transports: a stream
//! socket, HTTP request/response, and WebSocket.
//!
//! The core validates every incoming frame against the strict JSON-RPC
//! error taxonomy, dispatches to the registered method table, and emits
//! connection/notification events. On the stream and WebSocket
//! transports it can also push notifications to every attached client.
//!
//! ## Example
//!
//! ```ignore
//! use rill_server::{Server, ServerConfig, HandlerError};
//! use rill_jsonrpc::Params;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::tcp(ServerConfig::new("127.0.0.1", 4040));
//!     server.method("add", |params: Option<Params>| async move {
//!         let params = params.ok_or(HandlerError::InvalidParams)?;
//!         let a = params.get_index(0).and_then(|v| v.as_i64());
//!         let b = params.get_index(1).and_then(|v| v.as_i64());
//!         match (a, b) {
//!             (Some(a), Some(b)) => Ok(json!(a + b)),
//!             _ => Err(HandlerError::InvalidParams),
//!         }
//!     });
//!
//!     server.listen().await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.close().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod handler;
pub mod server;
pub mod transport;

pub use config::ServerConfig;
pub use core::ServerCore;
pub use error::{ServerError, ServerResult};
pub use events::{ClientId, ServerEvents};
pub use handler::{FnHandler, Handler, HandlerError, HandlerResult};
pub use server::{ListenState, Server, ServerTransport};

// Re-export the wire layer for handler authors.
pub use rill_jsonrpc as jsonrpc;
