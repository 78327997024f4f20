//! Registry for server-initiated notifications.
//!
//! Named-event subscription is an explicit callback registry: user
//! subscriptions live here, internal correlation events do not, so a
//! user subscription can never shadow the reserved `"batchResponse"`
//! channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use rill_jsonrpc::Notification;

use crate::error::{ClientError, ClientResult};

/// Internal batch correlation channel; not subscribable.
pub const RESERVED_BATCH_EVENT: &str = "batchResponse";

/// Callback invoked with each matching server notification.
pub type NotificationCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe one callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct Subscriptions {
    listeners: Mutex<HashMap<String, Vec<(SubscriptionId, NotificationCallback)>>>,
    next_id: AtomicU64,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(
        &self,
        method: &str,
        callback: NotificationCallback,
    ) -> ClientResult<SubscriptionId> {
        if method == RESERVED_BATCH_EVENT {
            return Err(ClientError::ReservedEvent(method.to_string()));
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .entry(method.to_string())
            .or_default()
            .push((id, callback));
        Ok(id)
    }

    /// Remove one callback. Returns false when it was not registered.
    pub fn unsubscribe(&self, method: &str, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        match listeners.get_mut(method) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|(entry_id, _)| *entry_id != id);
                let removed = entries.len() < before;
                if entries.is_empty() {
                    listeners.remove(method);
                }
                removed
            }
            None => false,
        }
    }

    pub fn unsubscribe_all(&self, method: &str) {
        self.listeners.lock().remove(method);
    }

    /// Invoke subscribers in registration order. Callbacks run outside
    /// the registry lock so they may themselves (un)subscribe.
    pub fn dispatch(&self, notification: &Notification) {
        let callbacks: Vec<NotificationCallback> = match self
            .listeners
            .lock()
            .get(&notification.method)
        {
            Some(entries) => entries.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => {
                debug!(method = %notification.method, "notification with no subscribers");
                return;
            }
        };
        for callback in callbacks {
            callback(notification);
        }
    }

    pub fn subscriber_count(&self, method: &str) -> usize {
        self.listeners
            .lock()
            .get(method)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_reserved_event_rejected() {
        let subs = Subscriptions::new();
        let result = subs.subscribe(RESERVED_BATCH_EVENT, Arc::new(|_| {}));
        assert!(matches!(result, Err(ClientError::ReservedEvent(_))));
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let subs = Subscriptions::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..3 {
            let order = Arc::clone(&order);
            subs.subscribe("tick", Arc::new(move |_| order.lock().push(tag)))
                .unwrap();
        }

        subs.dispatch(&Notification::new("tick", None));
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let subs = Subscriptions::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let id = subs
            .subscribe("tick", Arc::new(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert!(subs.unsubscribe("tick", id));
        assert!(!subs.unsubscribe("tick", id));
        subs.dispatch(&Notification::new("tick", None));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_all() {
        let subs = Subscriptions::new();
        subs.subscribe("tick", Arc::new(|_| {})).unwrap();
        subs.subscribe("tick", Arc::new(|_| {})).unwrap();
        assert_eq!(subs.subscriber_count("tick"), 2);
        subs.unsubscribe_all("tick");
        assert_eq!(subs.subscriber_count("tick"), 0);
    }
}
