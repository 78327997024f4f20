//! Server event registries.
//!
//! Named-event subscription is re-expressed as explicit callback
//! registries: connection lifecycle, incoming notifications keyed by
//! method name, and error reports. Callbacks run in registration order.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use rill_jsonrpc::Notification;

use crate::error::ServerError;

/// Identifier of one attached stream/WebSocket client.
pub type ClientId = u64;

pub type ConnectionCallback = Arc<dyn Fn(ClientId) + Send + Sync>;
pub type NotifyCallback = Arc<dyn Fn(&Notification) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&ServerError) + Send + Sync>;

#[derive(Default)]
pub struct ServerEvents {
    connected: Mutex<Vec<ConnectionCallback>>,
    disconnected: Mutex<Vec<ConnectionCallback>>,
    notify: Mutex<HashMap<String, Vec<NotifyCallback>>>,
    errors: Mutex<Vec<ErrorCallback>>,
}

impl ServerEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_connected(&self, callback: ConnectionCallback) {
        self.connected.lock().push(callback);
    }

    pub fn client_disconnected(&self, callback: ConnectionCallback) {
        self.disconnected.lock().push(callback);
    }

    /// Register a callback for incoming notifications of `method`.
    pub fn on_notify(&self, method: &str, callback: NotifyCallback) {
        self.notify
            .lock()
            .entry(method.to_string())
            .or_default()
            .push(callback);
    }

    pub fn on_error(&self, callback: ErrorCallback) {
        self.errors.lock().push(callback);
    }

    pub fn emit_connected(&self, id: ClientId) {
        let callbacks = self.connected.lock().to_vec();
        for callback in callbacks {
            callback(id);
        }
    }

    pub fn emit_disconnected(&self, id: ClientId) {
        let callbacks = self.disconnected.lock().to_vec();
        for callback in callbacks {
            callback(id);
        }
    }

    pub fn emit_notify(&self, notification: &Notification) {
        let callbacks: Vec<NotifyCallback> = self
            .notify
            .lock()
            .get(&notification.method)
            .map(|entries| entries.to_vec())
            .unwrap_or_default();
        for callback in callbacks {
            callback(notification);
        }
    }

    pub fn emit_error(&self, error: &ServerError) {
        let callbacks = self.errors.lock().to_vec();
        for callback in callbacks {
            callback(error);
        }
    }
}
