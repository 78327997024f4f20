//! # rill client
//!
//! JSON-RPC 2.0 client over three interchangeable transports: a stream
//! socket, HTTP request/response, and WebSocket.
//!
//! The client core owns id allocation, request/response correlation with
//! per-call timeouts, batch correlation by id set, a subscription
//! registry for server-push notifications, and reconnection with bounded
//! retries. Transports only marshal bytes.
//!
//! ## Example
//!
//! ```ignore
//! use rill_client::{Client, ClientConfig};
//! use rill_jsonrpc::Params;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::tcp(ClientConfig::new("127.0.0.1", 4040));
//!     client.connect().await?;
//!
//!     let response = client
//!         .send("add", Some(Params::Array(vec![json!(1), json!(2)])))
//!         .await?;
//!     println!("sum: {}", response.result);
//!
//!     client.end().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod correlation;
pub mod error;
pub mod subscription;
pub mod transport;

pub use client::{Client, ConnectionState};
pub use config::{ClientConfig, HttpOptions, WsOptions};
pub use correlation::CorrelationTable;
pub use error::{ClientError, ClientResult};
pub use subscription::{SubscriptionId, RESERVED_BATCH_EVENT};
pub use transport::{Transport, TransportEvent, TransportKind};

// Re-export the wire layer for callers building params and inspecting
// responses.
pub use rill_jsonrpc as jsonrpc;
