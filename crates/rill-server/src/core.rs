//! Transport-agnostic server core.
//!
//! Owns the method registry, frame validation and dispatch, the event
//! registries, and the attached-client list used for server-push
//! broadcast. Transport adapters feed it text and ship back whatever it
//! returns; all protocol logic lives here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use rill_jsonrpc::{
    Codec, ErrorCode, ErrorObject, ErrorResponse, Incoming, Notification, Params, Request,
    Response,
};

use crate::error::ServerError;
use crate::events::{ClientId, ServerEvents};
use crate::handler::{Handler, HandlerError};

pub struct ServerCore {
    codec: Codec,
    methods: Mutex<HashMap<String, Arc<dyn Handler>>>,
    events: ServerEvents,
    /// Attached stream/WebSocket clients and their outbound frame
    /// channels. Iterated during broadcast, mutated on (dis)connect.
    clients: DashMap<ClientId, mpsc::UnboundedSender<String>>,
    next_client_id: AtomicU64,
}

impl ServerCore {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            methods: Mutex::new(HashMap::new()),
            events: ServerEvents::new(),
            clients: DashMap::new(),
            next_client_id: AtomicU64::new(1),
        }
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn events(&self) -> &ServerEvents {
        &self.events
    }

    /// Register a method. The registry is written during setup and only
    /// read during dispatch.
    pub fn register(&self, name: &str, handler: Arc<dyn Handler>) {
        self.methods.lock().insert(name.to_string(), handler);
    }

    pub fn registered_methods(&self) -> Vec<String> {
        self.methods.lock().keys().cloned().collect()
    }

    // ── attached clients ────────────────────────────────────────────

    pub fn attach_client(&self) -> (ClientId, mpsc::UnboundedReceiver<String>) {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.insert(id, tx);
        self.events.emit_connected(id);
        (id, rx)
    }

    pub fn detach_client(&self, id: ClientId) {
        if self.clients.remove(&id).is_some() {
            self.events.emit_disconnected(id);
        }
    }

    pub fn client_sender(&self, id: ClientId) -> Option<mpsc::UnboundedSender<String>> {
        self.clients.get(&id).map(|entry| entry.value().clone())
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn clear_clients(&self) {
        self.clients.clear();
    }

    /// Broadcast a notification frame to every attached client. A
    /// failing client is reported as an `error` event and does not
    /// affect the others.
    pub fn notify(&self, method: &str, params: Option<Params>) {
        let notification = Notification::new(method, params);
        let frame = self
            .codec
            .frame(&self.codec.notification_value(&notification));
        let targets: Vec<(ClientId, mpsc::UnboundedSender<String>)> = self
            .clients
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        for (client, sender) in targets {
            if sender.send(frame.clone()).is_err() {
                let error = ServerError::Broadcast {
                    client,
                    reason: "outbound channel closed".to_string(),
                };
                warn!("{}", error);
                self.events.emit_error(&error);
            }
        }
    }

    // ── dispatch ────────────────────────────────────────────────────

    /// Process one stream/WebSocket frame. Returns the reply frame
    /// (delimiter included), or `None` when nothing is owed (a
    /// notification, or an all-notification batch).
    pub async fn process_frame(&self, frame: &str) -> Option<String> {
        let reply = self.process_text(frame).await?;
        Some(self.codec.frame(&reply))
    }

    /// Process one logical message (single or batch) to its reply value.
    pub async fn process_text(&self, text: &str) -> Option<Value> {
        match self.codec.decode(text) {
            Incoming::Batch(items) => {
                let replies = join_all(items.into_iter().map(|item| self.dispatch_single(item)))
                    .await
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>();
                if replies.is_empty() {
                    None
                } else {
                    Some(Value::Array(replies))
                }
            }
            single => self.dispatch_single(single).await,
        }
    }

    /// Dispatch one classified element. Notifications produce no reply.
    async fn dispatch_single(&self, incoming: Incoming) -> Option<Value> {
        match incoming {
            Incoming::Invalid { id, code } => Some(
                self.codec
                    .error_value(&ErrorResponse::new(id, ErrorObject::new(code))),
            ),
            Incoming::Notification(notification) => {
                debug!(method = %notification.method, "notification received");
                self.events.emit_notify(&notification);
                None
            }
            Incoming::Request(request) => Some(self.dispatch_request(request).await),
            Incoming::Response(_) | Incoming::Error(_) => {
                warn!("ignoring reply addressed to the server");
                None
            }
            // Batch elements must be objects; a nested array is invalid.
            Incoming::Batch(_) => Some(self.codec.error_value(&ErrorResponse::new(
                None,
                ErrorObject::new(ErrorCode::InvalidRequest),
            ))),
        }
    }

    async fn dispatch_request(&self, request: Request) -> Value {
        let handler = self.methods.lock().get(&request.method).cloned();
        let handler = match handler {
            Some(handler) => handler,
            None => {
                debug!(method = %request.method, "method not found");
                return self
                    .codec
                    .error_value(&ErrorResponse::method_not_found(request.id));
            }
        };

        match handler.call(request.params).await {
            Ok(result) => self
                .codec
                .response_value(&Response::new(request.id, result)),
            Err(HandlerError::InvalidParams) => self
                .codec
                .error_value(&ErrorResponse::invalid_params(Some(request.id))),
            Err(HandlerError::Failed(text)) => {
                debug!(method = %request.method, "handler failed: {}", text);
                self.codec
                    .error_value(&ErrorResponse::internal_error(Some(request.id), text))
            }
        }
    }

    // ── HTTP body handling ──────────────────────────────────────────

    /// Process a complete HTTP request body and choose the response
    /// status.
    ///
    /// Two or more delimiter segments form a multi-request whose replies
    /// join with the delimiter; a single segment is a single message, or
    /// a batch if it decodes as a JSON array (raw array response).
    /// Status: 200 on success, 204 when nothing is owed, otherwise the
    /// catalogue mapping of the primary (first) error code.
    pub async fn process_http_body(&self, body: &str) -> (u16, Option<String>) {
        let segments: Vec<&str> = body
            .split(self.codec.delimiter())
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect();

        match segments.len() {
            0 => {
                let reply = self.codec.error_value(&ErrorResponse::parse_error());
                (
                    ErrorCode::ParseError.http_status(),
                    Some(self.codec.render(&reply)),
                )
            }
            1 => match self.process_text(segments[0]).await {
                None => (204, None),
                Some(reply) => (http_status_for(&reply), Some(self.codec.render(&reply))),
            },
            _ => {
                let replies =
                    join_all(segments.iter().map(|segment| self.process_text(segment)))
                        .await
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>();
                if replies.is_empty() {
                    return (204, None);
                }
                let status = http_status_for_replies(&replies);
                let joined = replies
                    .iter()
                    .map(|reply| self.codec.render(reply))
                    .collect::<Vec<_>>()
                    .join(self.codec.delimiter());
                (status, Some(joined))
            }
        }
    }
}

fn is_error_entry(value: &Value) -> bool {
    value.get("error").map(|e| !e.is_null()).unwrap_or(false)
}

fn entry_status(value: &Value) -> u16 {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(Value::as_i64)
        .and_then(ErrorCode::from_code)
        .map(|code| code.http_status())
        .unwrap_or(500)
}

fn http_status_for(value: &Value) -> u16 {
    match value {
        Value::Array(items) => http_status_for_replies(items),
        single => {
            if is_error_entry(single) {
                entry_status(single)
            } else {
                200
            }
        }
    }
}

fn http_status_for_replies(replies: &[Value]) -> u16 {
    if replies.iter().any(|reply| !is_error_entry(reply)) {
        200
    } else {
        replies.first().map(entry_status).unwrap_or(200)
    }
}
