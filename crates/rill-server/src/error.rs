use thiserror::Error;

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind failed: {0}")]
    Bind(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `listen` is not re-entrant
    #[error("server is already listening")]
    AlreadyListening,

    #[error("server is not listening")]
    NotListening,

    #[error("configuration error: {0}")]
    Config(String),

    /// A broadcast write to one attached client failed; surfaced as an
    /// `error` event without affecting the other clients.
    #[error("broadcast to client {client} failed: {reason}")]
    Broadcast { client: u64, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
