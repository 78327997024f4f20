use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fixed error catalogue.
///
/// Numeric code, canonical text and the HTTP status the server maps the
/// code to when replying over the HTTP transport. `RequestTimeout` is
/// synthesized on the client side only and never sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    RequestTimeout,
}

impl ErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::RequestTimeout => -32000,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse Error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid Parameters",
            ErrorCode::InternalError => "Internal Error",
            ErrorCode::RequestTimeout => "Request Timeout",
        }
    }

    /// Status used by the HTTP server adapter when a reply carries this code.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::ParseError => 500,
            ErrorCode::InvalidRequest => 400,
            ErrorCode::MethodNotFound => 404,
            ErrorCode::InvalidParams => 400,
            ErrorCode::InternalError => 500,
            ErrorCode::RequestTimeout => 408,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -32700 => Some(ErrorCode::ParseError),
            -32600 => Some(ErrorCode::InvalidRequest),
            -32601 => Some(ErrorCode::MethodNotFound),
            -32602 => Some(ErrorCode::InvalidParams),
            -32603 => Some(ErrorCode::InternalError),
            -32000 => Some(ErrorCode::RequestTimeout),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// JSON-RPC error object as it appears inside a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Error object with the catalogue's canonical message.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.message().to_string(),
            data: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error() -> Self {
        Self::new(ErrorCode::ParseError)
    }

    pub fn invalid_request() -> Self {
        Self::new(ErrorCode::InvalidRequest)
    }

    pub fn method_not_found() -> Self {
        Self::new(ErrorCode::MethodNotFound)
    }

    pub fn invalid_params() -> Self {
        Self::new(ErrorCode::InvalidParams)
    }

    /// Internal error carrying the handler failure's textual form.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, message)
    }

    pub fn request_timeout() -> Self {
        Self::new(ErrorCode::RequestTimeout)
    }

    /// The catalogue entry for this code, if it is a catalogued one.
    pub fn catalogued(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}

/// A JSON-RPC error response. `id` is null when the failing request's id
/// could not be determined (parse errors, client-synthesized timeouts).
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: ErrorObject,
    pub id: Option<i64>,
}

impl ErrorResponse {
    pub fn new(id: Option<i64>, error: ErrorObject) -> Self {
        Self { error, id }
    }

    pub fn parse_error() -> Self {
        Self::new(None, ErrorObject::parse_error())
    }

    pub fn invalid_request(id: Option<i64>) -> Self {
        Self::new(id, ErrorObject::invalid_request())
    }

    pub fn method_not_found(id: i64) -> Self {
        Self::new(Some(id), ErrorObject::method_not_found())
    }

    pub fn invalid_params(id: Option<i64>) -> Self {
        Self::new(id, ErrorObject::invalid_params())
    }

    pub fn internal_error(id: Option<i64>, message: impl Into<String>) -> Self {
        Self::new(id, ErrorObject::internal_error(message))
    }

    /// The client-side synthetic timeout rejection. Carries a null id.
    pub fn request_timeout() -> Self {
        Self::new(None, ErrorObject::request_timeout())
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JSON-RPC error {}: {}",
            self.error.code, self.error.message
        )
    }
}

impl std::error::Error for ErrorResponse {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_codes() {
        assert_eq!(ErrorCode::ParseError.code(), -32700);
        assert_eq!(ErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(ErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(ErrorCode::InvalidParams.code(), -32602);
        assert_eq!(ErrorCode::InternalError.code(), -32603);
        assert_eq!(ErrorCode::RequestTimeout.code(), -32000);
    }

    #[test]
    fn test_canonical_messages() {
        assert_eq!(ErrorCode::ParseError.message(), "Parse Error");
        assert_eq!(ErrorCode::InvalidParams.message(), "Invalid Parameters");
        assert_eq!(ErrorCode::MethodNotFound.message(), "Method not found");
        assert_eq!(ErrorCode::RequestTimeout.message(), "Request Timeout");
    }

    #[test]
    fn test_http_mapping() {
        assert_eq!(ErrorCode::ParseError.http_status(), 500);
        assert_eq!(ErrorCode::InvalidRequest.http_status(), 400);
        assert_eq!(ErrorCode::MethodNotFound.http_status(), 404);
        assert_eq!(ErrorCode::InvalidParams.http_status(), 400);
        assert_eq!(ErrorCode::InternalError.http_status(), 500);
        assert_eq!(ErrorCode::RequestTimeout.http_status(), 408);
    }

    #[test]
    fn test_error_object_serialization() {
        let obj = ErrorObject::method_not_found();
        let json = serde_json::to_string(&obj).unwrap();
        assert!(json.contains(r#""code":-32601"#));
        assert!(json.contains(r#""message":"Method not found""#));
        // data omitted entirely when absent
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_internal_error_carries_handler_text() {
        let obj = ErrorObject::internal_error("boom");
        assert_eq!(obj.code, -32603);
        assert_eq!(obj.message, "boom");
    }

    #[test]
    fn test_from_code_round_trip() {
        for code in [
            ErrorCode::ParseError,
            ErrorCode::InvalidRequest,
            ErrorCode::MethodNotFound,
            ErrorCode::InvalidParams,
            ErrorCode::InternalError,
            ErrorCode::RequestTimeout,
        ] {
            assert_eq!(ErrorCode::from_code(code.code()), Some(code));
        }
        assert_eq!(ErrorCode::from_code(-1), None);
    }
}
