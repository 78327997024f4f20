//! Error types for client operations

use rill_jsonrpc::ErrorResponse;
use serde_json::Value;
use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (write failed, handshake failed, ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// Establishing the connection failed
    #[error("connect failed: {0}")]
    Connect(String),

    /// Configuration error (bad URL, bad scheme, ...)
    #[error("configuration error: {0}")]
    Config(String),

    /// The connection is closed; no further operations are possible
    #[error("connection is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// `"batchResponse"` is reserved for internal batch correlation
    #[error("cannot subscribe to reserved event name {0:?}")]
    ReservedEvent(String),

    /// A new batch reused ids still claimed by a pending call or batch
    #[error("batch ids overlap a pending call or batch")]
    OverlappingBatch,

    #[error("batch must contain at least one frame")]
    EmptyBatch,

    /// The peer answered with a JSON-RPC error response. Synthesized
    /// timeouts surface here too, as `-32000` with a null id.
    #[error(transparent)]
    Rpc(#[from] ErrorResponse),

    /// A batch response contained at least one error entry; the whole
    /// response array is carried for inspection.
    #[error("batch response contains {} error entries", count_errors(.0))]
    Batch(Vec<Value>),
}

fn count_errors(items: &[Value]) -> usize {
    items
        .iter()
        .filter(|item| item.get("error").map(|e| !e.is_null()).unwrap_or(false))
        .count()
}

impl ClientError {
    /// The JSON-RPC error code, when the failure is a peer rejection.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            ClientError::Rpc(response) => Some(response.error.code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_code() {
        let err = ClientError::Rpc(ErrorResponse::request_timeout());
        assert_eq!(err.rpc_code(), Some(-32000));
        assert_eq!(ClientError::Closed.rpc_code(), None);
    }

    #[test]
    fn test_batch_error_count() {
        let items = vec![
            serde_json::json!({"jsonrpc": "2.0", "result": 1, "id": 1}),
            serde_json::json!({"jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found"}, "id": 2}),
        ];
        let err = ClientError::Batch(items);
        assert!(err.to_string().contains("1 error"));
    }
}
