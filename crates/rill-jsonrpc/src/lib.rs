//! # JSON-RPC 2.0 Wire Layer
//!
//! Transport-agnostic wire layer shared by the rill client and server:
//! message types, the fixed error catalogue, a version-aware codec and a
//! delimiter framing buffer for stream transports.
//!
//! This crate contains no I/O. Transports hand byte chunks to
//! [`FrameBuffer`], frames to [`Codec::decode`], and ship the strings
//! produced by [`Codec::frame`] / [`Codec::render`].
//!
//! ## Framing contract
//!
//! Frames on stream transports are separated by a configurable delimiter
//! (newline by default). The delimiter must not appear inside JSON values
//! emitted by peers; both endpoints emit it only at message boundaries.

pub mod codec;
pub mod error;
pub mod framing;
pub mod message;
pub mod types;

pub use codec::{Codec, DEFAULT_DELIMITER};
pub use error::{ErrorCode, ErrorObject, ErrorResponse};
pub use framing::FrameBuffer;
pub use message::{Incoming, Notification, Params, Request, Response};
pub use types::ProtocolVersion;

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Client-synthesized timeout; never sent on the wire.
    pub const REQUEST_TIMEOUT: i64 = -32000;
}
