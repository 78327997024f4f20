use serde_json::{Map, Value};

use crate::error::{ErrorCode, ErrorObject, ErrorResponse};
use crate::message::{Incoming, Notification, Params, Request, Response};
use crate::types::ProtocolVersion;

/// Default frame delimiter on stream transports.
pub const DEFAULT_DELIMITER: &str = "\n";

/// Version-aware message codec.
///
/// Encoding emits canonical JSON per message variant. With version "2.0"
/// every object carries `"jsonrpc":"2.0"`; with "1.0" the field is
/// omitted and responses use the legacy shape where `result` and `error`
/// are both present, one of them null.
///
/// [`Codec::frame`] appends the configured delimiter for stream
/// transports; [`Codec::render`] omits it for HTTP bodies.
#[derive(Debug, Clone)]
pub struct Codec {
    version: ProtocolVersion,
    delimiter: String,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(ProtocolVersion::V2, DEFAULT_DELIMITER)
    }
}

impl Codec {
    pub fn new(version: ProtocolVersion, delimiter: impl Into<String>) -> Self {
        Self {
            version,
            delimiter: delimiter.into(),
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    // ── encoding ────────────────────────────────────────────────────

    pub fn request_value(&self, request: &Request) -> Value {
        let mut obj = Map::new();
        if self.version.is_v2() {
            obj.insert("jsonrpc".into(), Value::String("2.0".into()));
        }
        obj.insert("method".into(), Value::String(request.method.clone()));
        if let Some(params) = &request.params {
            obj.insert("params".into(), params.to_value());
        }
        obj.insert("id".into(), Value::from(request.id));
        Value::Object(obj)
    }

    pub fn notification_value(&self, notification: &Notification) -> Value {
        let mut obj = Map::new();
        if self.version.is_v2() {
            obj.insert("jsonrpc".into(), Value::String("2.0".into()));
        }
        obj.insert("method".into(), Value::String(notification.method.clone()));
        if let Some(params) = &notification.params {
            obj.insert("params".into(), params.to_value());
        }
        Value::Object(obj)
    }

    pub fn response_value(&self, response: &Response) -> Value {
        let mut obj = Map::new();
        if self.version.is_v2() {
            obj.insert("jsonrpc".into(), Value::String("2.0".into()));
            obj.insert("result".into(), response.result.clone());
        } else {
            obj.insert("result".into(), response.result.clone());
            obj.insert("error".into(), Value::Null);
        }
        obj.insert("id".into(), Value::from(response.id));
        Value::Object(obj)
    }

    pub fn error_value(&self, error: &ErrorResponse) -> Value {
        let mut obj = Map::new();
        let error_obj = serde_json::to_value(&error.error).unwrap_or(Value::Null);
        if self.version.is_v2() {
            obj.insert("jsonrpc".into(), Value::String("2.0".into()));
            obj.insert("error".into(), error_obj);
        } else {
            obj.insert("result".into(), Value::Null);
            obj.insert("error".into(), error_obj);
        }
        obj.insert("id".into(), error.id.map(Value::from).unwrap_or(Value::Null));
        Value::Object(obj)
    }

    /// Render without the delimiter (HTTP bodies, batch elements).
    pub fn render(&self, value: &Value) -> String {
        value.to_string()
    }

    /// Render with the trailing delimiter (stream transports).
    pub fn frame(&self, value: &Value) -> String {
        let mut text = value.to_string();
        text.push_str(&self.delimiter);
        text
    }

    // ── decoding ────────────────────────────────────────────────────

    /// Decode one frame. A frame that is not JSON classifies as
    /// `Invalid` with the parse-error code and a null id.
    pub fn decode(&self, frame: &str) -> Incoming {
        match serde_json::from_str::<Value>(frame) {
            Ok(value) => self.classify(value),
            Err(_) => Incoming::Invalid {
                id: None,
                code: ErrorCode::ParseError,
            },
        }
    }

    /// Classify a parsed value into a message kind.
    pub fn classify(&self, value: Value) -> Incoming {
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Incoming::Invalid {
                        id: None,
                        code: ErrorCode::InvalidRequest,
                    };
                }
                Incoming::Batch(items.into_iter().map(|v| self.classify(v)).collect())
            }
            Value::Object(obj) => self.classify_object(obj),
            _ => Incoming::Invalid {
                id: None,
                code: ErrorCode::InvalidRequest,
            },
        }
    }

    fn classify_object(&self, obj: Map<String, Value>) -> Incoming {
        // A present non-integer id invalidates the element outright; a
        // null id is treated as absent (error responses carry it).
        let id = match obj.get("id") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(id) => Some(id),
                None => {
                    return Incoming::Invalid {
                        id: None,
                        code: ErrorCode::InvalidRequest,
                    }
                }
            },
            Some(_) => {
                return Incoming::Invalid {
                    id: None,
                    code: ErrorCode::InvalidRequest,
                }
            }
        };

        if let Some(version) = obj.get("jsonrpc") {
            if version.as_str() != Some(self.version.as_str()) {
                return Incoming::Invalid {
                    id,
                    code: ErrorCode::InvalidRequest,
                };
            }
        }

        if let Some(method) = obj.get("method") {
            let Value::String(method) = method else {
                return Incoming::Invalid {
                    id,
                    code: ErrorCode::InvalidRequest,
                };
            };

            let params = match obj.get("params") {
                None => None,
                Some(raw) => match Params::from_value(raw.clone()) {
                    Some(params) => Some(params),
                    None => {
                        return Incoming::Invalid {
                            id,
                            code: ErrorCode::InvalidParams,
                        }
                    }
                },
            };

            return match id {
                Some(id) => Incoming::Request(Request {
                    method: method.clone(),
                    params,
                    id,
                }),
                None => Incoming::Notification(Notification {
                    method: method.clone(),
                    params,
                }),
            };
        }

        // No method: a reply. Legacy 1.0 responses carry both fields with
        // one of them null, so a null error means success.
        match obj.get("error") {
            Some(raw) if !raw.is_null() => {
                match serde_json::from_value::<ErrorObject>(raw.clone()) {
                    Ok(error) => Incoming::Error(ErrorResponse { error, id }),
                    Err(_) => Incoming::Invalid {
                        id,
                        code: ErrorCode::InvalidRequest,
                    },
                }
            }
            _ => match (obj.get("result"), id) {
                (Some(result), Some(id)) => Incoming::Response(Response {
                    result: result.clone(),
                    id,
                }),
                _ => Incoming::Invalid {
                    id,
                    code: ErrorCode::InvalidRequest,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v2() -> Codec {
        Codec::default()
    }

    fn v1() -> Codec {
        Codec::new(ProtocolVersion::V1, DEFAULT_DELIMITER)
    }

    #[test]
    fn test_encode_request() {
        let value = v2().request_value(&Request::new("add", Some(json_params([1, 2])), 1));
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "method": "add", "params": [1, 2], "id": 1})
        );
    }

    fn json_params(items: [i64; 2]) -> Params {
        Params::Array(items.iter().map(|&n| json!(n)).collect())
    }

    #[test]
    fn test_encode_notification_has_no_id() {
        let value = v2().notification_value(&Notification::new("ping", None));
        assert_eq!(value, json!({"jsonrpc": "2.0", "method": "ping"}));
    }

    #[test]
    fn test_encode_response_versions() {
        let response = Response::new(1, json!(3));
        assert_eq!(
            v2().response_value(&response),
            json!({"jsonrpc": "2.0", "result": 3, "id": 1})
        );
        assert_eq!(
            v1().response_value(&response),
            json!({"result": 3, "error": null, "id": 1})
        );
    }

    #[test]
    fn test_encode_error_versions() {
        let error = ErrorResponse::method_not_found(3);
        assert_eq!(
            v2().error_value(&error),
            json!({"jsonrpc": "2.0", "error": {"code": -32601, "message": "Method not found"}, "id": 3})
        );
        assert_eq!(
            v1().error_value(&error),
            json!({"result": null, "error": {"code": -32601, "message": "Method not found"}, "id": 3})
        );
    }

    #[test]
    fn test_frame_appends_delimiter() {
        let codec = v2();
        let value = json!({"a": 1});
        assert!(codec.frame(&value).ends_with('\n'));
        assert!(!codec.render(&value).ends_with('\n'));
    }

    #[test]
    fn test_decode_parse_error() {
        assert_eq!(
            v2().decode("test"),
            Incoming::Invalid {
                id: None,
                code: ErrorCode::ParseError
            }
        );
    }

    #[test]
    fn test_decode_empty_batch_is_invalid() {
        assert_eq!(
            v2().decode("[]"),
            Incoming::Invalid {
                id: None,
                code: ErrorCode::InvalidRequest
            }
        );
    }

    #[test]
    fn test_decode_non_object_is_invalid() {
        assert_eq!(
            v2().decode("42"),
            Incoming::Invalid {
                id: None,
                code: ErrorCode::InvalidRequest
            }
        );
    }

    #[test]
    fn test_decode_non_string_method_echoes_id() {
        let incoming = v2().decode(r#"{"jsonrpc":"2.0","method":1,"params":[],"id":69}"#);
        assert_eq!(
            incoming,
            Incoming::Invalid {
                id: Some(69),
                code: ErrorCode::InvalidRequest
            }
        );
    }

    #[test]
    fn test_decode_version_mismatch() {
        let incoming = v2().decode(r#"{"jsonrpc":"1.0","method":"m","id":1}"#);
        assert_eq!(
            incoming,
            Incoming::Invalid {
                id: Some(1),
                code: ErrorCode::InvalidRequest
            }
        );
    }

    #[test]
    fn test_decode_scalar_params() {
        let incoming = v2().decode(r#"{"jsonrpc":"2.0","method":"m","params":5,"id":1}"#);
        assert_eq!(
            incoming,
            Incoming::Invalid {
                id: Some(1),
                code: ErrorCode::InvalidParams
            }
        );
    }

    #[test]
    fn test_decode_notification() {
        let incoming = v2().decode(r#"{"jsonrpc":"2.0","method":"tick","params":[]}"#);
        match incoming {
            Incoming::Notification(n) => assert_eq!(n.method, "tick"),
            other => panic!("expected notification, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_response_and_error() {
        match v2().decode(r#"{"jsonrpc":"2.0","result":3,"id":1}"#) {
            Incoming::Response(r) => {
                assert_eq!(r.result, json!(3));
                assert_eq!(r.id, 1);
            }
            other => panic!("expected response, got {:?}", other),
        }
        match v2().decode(r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":3}"#)
        {
            Incoming::Error(e) => {
                assert_eq!(e.error.code, -32601);
                assert_eq!(e.id, Some(3));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_legacy_success_shape() {
        match v1().decode(r#"{"result":3,"error":null,"id":1}"#) {
            Incoming::Response(r) => assert_eq!(r.result, json!(3)),
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_batch_recurses() {
        let incoming = v2().decode(
            r#"[{"jsonrpc":"2.0","method":"a","id":1},{"jsonrpc":"2.0","method":"b"},"junk"]"#,
        );
        match incoming {
            Incoming::Batch(items) => {
                assert_eq!(items.len(), 3);
                assert!(matches!(items[0], Incoming::Request(_)));
                assert!(matches!(items[1], Incoming::Notification(_)));
                assert!(items[2].is_invalid());
            }
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_all_variants() {
        let codec = v2();
        let request = Request::new("add", Some(Params::Array(vec![json!(1), json!(2)])), 1);
        match codec.decode(&codec.frame(&codec.request_value(&request))) {
            Incoming::Request(r) => assert_eq!(r, request),
            other => panic!("round trip lost request: {:?}", other),
        }

        let notification = Notification::new("tick", None);
        match codec.decode(&codec.frame(&codec.notification_value(&notification))) {
            Incoming::Notification(n) => assert_eq!(n, notification),
            other => panic!("round trip lost notification: {:?}", other),
        }

        let response = Response::new(9, json!({"ok": true}));
        match codec.decode(&codec.frame(&codec.response_value(&response))) {
            Incoming::Response(r) => assert_eq!(r, response),
            other => panic!("round trip lost response: {:?}", other),
        }

        let error = ErrorResponse::internal_error(Some(4), "boom");
        match codec.decode(&codec.frame(&codec.error_value(&error))) {
            Incoming::Error(e) => assert_eq!(e, error),
            other => panic!("round trip lost error: {:?}", other),
        }
    }
}
