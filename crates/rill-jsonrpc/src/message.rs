use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ErrorCode, ErrorResponse};

/// Parameters for a request or notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    /// Positional parameters as an array
    Array(Vec<Value>),
    /// Named parameters as an object
    Object(Map<String, Value>),
}

impl Params {
    /// Classify a raw value as params. Anything other than an array or an
    /// object is not a valid params shape.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(Params::Array(items)),
            Value::Object(map) => Some(Params::Object(map)),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Params::Array(items) => Value::Array(items.clone()),
            Params::Object(map) => Value::Object(map.clone()),
        }
    }

    /// Get a named parameter (object params only).
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Params::Object(map) => map.get(key),
            Params::Array(_) => None,
        }
    }

    /// Get a positional parameter (array params only).
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            Params::Array(items) => items.get(index),
            Params::Object(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Params::Array(items) => items.len(),
            Params::Object(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<Value>> for Params {
    fn from(items: Vec<Value>) -> Self {
        Params::Array(items)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params::Object(map)
    }
}

/// A call expecting a reply. Ids on this wire are integers, allocated
/// monotonically per client starting at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub params: Option<Params>,
    pub id: i64,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Option<Params>, id: i64) -> Self {
        Self {
            method: method.into(),
            params,
            id,
        }
    }
}

/// A request without an id; never answered.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: String,
    pub params: Option<Params>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Params>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// A successful reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub result: Value,
    pub id: i64,
}

impl Response {
    pub fn new(id: i64, result: Value) -> Self {
        Self { result, id }
    }
}

/// Classification of one decoded frame.
///
/// `Invalid` carries the offending element's id when one could be
/// extracted, so the reply can echo it.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Request(Request),
    Notification(Notification),
    Response(Response),
    Error(ErrorResponse),
    Invalid { id: Option<i64>, code: ErrorCode },
    Batch(Vec<Incoming>),
}

impl Incoming {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Incoming::Invalid { .. })
    }

    /// The id this element settles, if any.
    pub fn id(&self) -> Option<i64> {
        match self {
            Incoming::Request(r) => Some(r.id),
            Incoming::Response(r) => Some(r.id),
            Incoming::Error(e) => e.id,
            Incoming::Invalid { id, .. } => *id,
            Incoming::Notification(_) | Incoming::Batch(_) => None,
        }
    }
}
