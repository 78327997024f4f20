//! Client core: id allocation, request/notification/batch issuance,
//! frame routing into the correlation table, and the connect/close state
//! machine with bounded reconnection.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use rill_jsonrpc::{Codec, FrameBuffer, Incoming, Notification, Params, Request, Response};

use crate::config::ClientConfig;
use crate::correlation::CorrelationTable;
use crate::error::{ClientError, ClientResult};
use crate::subscription::{SubscriptionId, Subscriptions};
use crate::transport::{
    BoxedTransport, HttpTransport, TcpTransport, TransportEvent, TransportKind, WsTransport,
};

/// Client connection lifecycle.
///
/// ```text
/// Idle --connect--> Connecting --open--> Open
/// Open --remote close--> Retrying --timer--> Connecting
/// Retrying --exhausted--> Closed
/// Any  --local close--> Closed
/// ```
///
/// The HTTP client is stateless and reports `Open` from construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Retrying,
}

struct Lifecycle {
    state: ConnectionState,
    remaining_retries: u32,
    locally_closed: bool,
}

type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;

struct ClientShared {
    config: ClientConfig,
    codec: Codec,
    kind: TransportKind,
    next_id: AtomicI64,
    correlations: Arc<CorrelationTable>,
    subscriptions: Subscriptions,
    transport: tokio::sync::Mutex<BoxedTransport>,
    lifecycle: Mutex<Lifecycle>,
    disconnect_callbacks: Mutex<Vec<DisconnectCallback>>,
}

/// A JSON-RPC client over one of the three transports.
///
/// Cloning is cheap; all clones share the same connection, id counter
/// and correlation table.
#[derive(Clone)]
pub struct Client {
    shared: Arc<ClientShared>,
}

impl Client {
    /// Client over the stream transport at `config.host:config.port`.
    pub fn tcp(config: ClientConfig) -> Self {
        let transport = TcpTransport::new(config.addr(), config.delimiter.clone());
        Self::with_transport(config, TransportKind::Tcp, Box::new(transport))
    }

    /// Client over HTTP. Every call opens a fresh request.
    pub fn http(config: ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(
            &config.http_url(),
            config.http.headers.clone(),
            config.timeout,
        )?;
        Ok(Self::with_transport(
            config,
            TransportKind::Http,
            Box::new(transport),
        ))
    }

    /// Client over WebSocket.
    pub fn ws(config: ClientConfig) -> ClientResult<Self> {
        let transport = WsTransport::new(
            config.ws_url(),
            config.delimiter.clone(),
            config.ws.per_message_deflate,
        )?;
        Ok(Self::with_transport(
            config,
            TransportKind::Ws,
            Box::new(transport),
        ))
    }

    fn with_transport(config: ClientConfig, kind: TransportKind, transport: BoxedTransport) -> Self {
        let codec = Codec::new(config.version, config.delimiter.clone());
        let state = if kind == TransportKind::Http {
            ConnectionState::Open
        } else {
            ConnectionState::Idle
        };
        let retries = config.retries;
        Self {
            shared: Arc::new(ClientShared {
                config,
                codec,
                kind,
                next_id: AtomicI64::new(1),
                correlations: Arc::new(CorrelationTable::new()),
                subscriptions: Subscriptions::new(),
                transport: tokio::sync::Mutex::new(transport),
                lifecycle: Mutex::new(Lifecycle {
                    state,
                    remaining_retries: retries,
                    locally_closed: false,
                }),
                disconnect_callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lifecycle.lock().state
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.shared.kind
    }

    pub fn pending_calls(&self) -> usize {
        self.shared.correlations.pending_calls()
    }

    /// Open the connection (no-op for the stateless HTTP client).
    pub async fn connect(&self) -> ClientResult<()> {
        if self.shared.kind == TransportKind::Http {
            return Ok(());
        }
        {
            let mut lifecycle = self.shared.lifecycle.lock();
            match lifecycle.state {
                ConnectionState::Idle | ConnectionState::Closed => {}
                state => {
                    return Err(ClientError::Connect(format!(
                        "connect in state {:?}",
                        state
                    )))
                }
            }
            lifecycle.state = ConnectionState::Connecting;
            lifecycle.locally_closed = false;
        }

        let events = {
            let mut transport = self.shared.transport.lock().await;
            match transport.connect().await {
                Ok(()) => transport.take_events(),
                Err(e) => {
                    self.shared.lifecycle.lock().state = ConnectionState::Idle;
                    return Err(e);
                }
            }
        };
        {
            let mut lifecycle = self.shared.lifecycle.lock();
            lifecycle.state = ConnectionState::Open;
            lifecycle.remaining_retries = self.shared.config.retries;
        }
        if let Some(events) = events {
            spawn_pump(Arc::clone(&self.shared), events);
        }
        Ok(())
    }

    /// Close locally. In-flight calls settle with [`ClientError::Closed`];
    /// no reconnection is attempted.
    pub async fn end(&self) -> ClientResult<()> {
        {
            let mut lifecycle = self.shared.lifecycle.lock();
            lifecycle.locally_closed = true;
            lifecycle.state = ConnectionState::Closed;
        }
        self.shared.correlations.abort_all();
        self.shared.transport.lock().await.close().await
    }

    /// Build an encoded frame (delimiter included). `want_id` allocates
    /// the next id; otherwise the frame is a notification.
    pub fn message(&self, method: &str, params: Option<Params>, want_id: bool) -> String {
        if want_id {
            let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
            let request = Request::new(method, params, id);
            self.shared
                .codec
                .frame(&self.shared.codec.request_value(&request))
        } else {
            let notification = Notification::new(method, params);
            self.shared
                .codec
                .frame(&self.shared.codec.notification_value(&notification))
        }
    }

    /// Issue a request and await its reply or deadline.
    pub async fn send(&self, method: &str, params: Option<Params>) -> ClientResult<Response> {
        self.shared.ensure_open()?;
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let request = Request::new(method, params, id);
        let payload = self
            .shared
            .outbound(&self.shared.codec.request_value(&request));

        // Insert before write so a fast reply always finds its entry.
        let rx = self
            .shared
            .correlations
            .register(id, self.shared.config.timeout);

        let written = { self.shared.transport.lock().await.send(&payload).await };
        match written {
            Ok(Some(body)) => self.shared.route_body(&body),
            Ok(None) => {}
            Err(e) => {
                self.shared.correlations.discard(id);
                return Err(e);
            }
        }

        match rx.await {
            Ok(settlement) => settlement,
            Err(_) => Err(ClientError::Closed),
        }
    }

    /// Issue a notification. Stream/WS resolve once the write completes;
    /// HTTP resolves on a 204 acknowledgment and rejects otherwise.
    pub async fn notify(&self, method: &str, params: Option<Params>) -> ClientResult<()> {
        self.shared.ensure_open()?;
        let notification = Notification::new(method, params);
        let payload = self
            .shared
            .outbound(&self.shared.codec.notification_value(&notification));

        let outcome = { self.shared.transport.lock().await.send(&payload).await? };
        match (self.shared.kind, outcome) {
            (TransportKind::Http, None) => Ok(()),
            (TransportKind::Http, Some(body)) => Err(ClientError::Transport(format!(
                "notification not acknowledged with 204: {}",
                body.trim()
            ))),
            _ => Ok(()),
        }
    }

    /// Send pre-built frames (from [`Client::message`]) as one batch and
    /// await the full response array. The batch is correlated by the
    /// exact set of non-notification ids; an all-notification batch
    /// resolves with an empty array once the write completes.
    pub async fn batch(&self, frames: Vec<String>) -> ClientResult<Vec<Value>> {
        self.shared.ensure_open()?;
        if frames.is_empty() {
            return Err(ClientError::EmptyBatch);
        }

        let mut items = Vec::with_capacity(frames.len());
        let mut ids = Vec::new();
        for frame in &frames {
            let value: Value = serde_json::from_str(frame.trim())?;
            if let Some(id) = value.get("id").and_then(Value::as_i64) {
                ids.push(id);
            }
            items.push(value);
        }
        let payload = self.shared.outbound(&Value::Array(items));

        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            self.shared.transport.lock().await.send(&payload).await?;
            return Ok(Vec::new());
        }

        let rx = self
            .shared
            .correlations
            .register_batch(ids.clone(), self.shared.config.timeout)?;

        let written = { self.shared.transport.lock().await.send(&payload).await };
        match written {
            Ok(Some(body)) => self.shared.route_body(&body),
            Ok(None) => {}
            Err(e) => {
                self.shared.correlations.discard_batch(&ids);
                return Err(e);
            }
        }

        match rx.await {
            Ok(settlement) => settlement,
            Err(_) => Err(ClientError::Closed),
        }
    }

    /// Register a callback for server-push notifications of `method`.
    /// `"batchResponse"` is reserved and cannot be subscribed.
    pub fn subscribe<F>(&self, method: &str, callback: F) -> ClientResult<SubscriptionId>
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.shared.subscriptions.subscribe(method, Arc::new(callback))
    }

    pub fn unsubscribe(&self, method: &str, id: SubscriptionId) -> bool {
        self.shared.subscriptions.unsubscribe(method, id)
    }

    pub fn unsubscribe_all(&self, method: &str) {
        self.shared.subscriptions.unsubscribe_all(method)
    }

    /// Register a callback invoked when the server closes the connection.
    pub fn server_disconnected<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared
            .disconnect_callbacks
            .lock()
            .push(Arc::new(callback));
    }
}

impl ClientShared {
    fn ensure_open(&self) -> ClientResult<()> {
        if self.kind == TransportKind::Http {
            return Ok(());
        }
        match self.lifecycle.lock().state {
            ConnectionState::Open => Ok(()),
            _ => Err(ClientError::Closed),
        }
    }

    /// Frames carry the delimiter on stream transports; HTTP bodies do not.
    fn outbound(&self, value: &Value) -> String {
        match self.kind {
            TransportKind::Http => self.codec.render(value),
            _ => self.codec.frame(value),
        }
    }

    fn route_frame(&self, frame: &str) {
        let value: Value = match serde_json::from_str(frame) {
            Ok(value) => value,
            Err(e) => {
                warn!("discarding unparseable frame: {}", e);
                return;
            }
        };
        match value {
            Value::Array(items) => {
                if !self.correlations.match_batch(items) {
                    debug!("batch response matched no pending batch");
                }
            }
            other => match self.codec.classify(other) {
                Incoming::Response(response) => {
                    self.correlations.resolve(response.id, response);
                }
                Incoming::Error(error) => match error.id {
                    Some(id) => {
                        self.correlations.reject(id, error);
                    }
                    None => warn!("uncorrelatable server error: {}", error),
                },
                Incoming::Notification(notification) => {
                    self.subscriptions.dispatch(&notification)
                }
                Incoming::Request(request) => {
                    debug!(method = %request.method, "ignoring request addressed to the client")
                }
                other => debug!(?other, "ignoring frame"),
            },
        }
    }

    /// Route an HTTP response body: raw JSON (single or batch) or a
    /// delimiter-joined multi-response.
    fn route_body(&self, body: &str) {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return;
        }
        if serde_json::from_str::<Value>(trimmed).is_ok() {
            self.route_frame(trimmed);
            return;
        }
        let mut framing = FrameBuffer::new(self.codec.delimiter());
        framing.push(body.as_bytes());
        framing.push(self.codec.delimiter().as_bytes());
        for frame in framing.extract() {
            self.route_frame(&frame);
        }
    }
}

fn spawn_pump(shared: Arc<ClientShared>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Frame(frame) => shared.route_frame(&frame),
                TransportEvent::Closed => break,
            }
        }
        handle_remote_close(shared).await;
    });
}

/// Remote close: fire disconnect callbacks, then retry with the
/// configured delay until reconnected or retries are exhausted.
/// In-flight calls are not replayed; their deadlines settle them.
async fn handle_remote_close(shared: Arc<ClientShared>) {
    {
        let lifecycle = shared.lifecycle.lock();
        if lifecycle.locally_closed || lifecycle.state == ConnectionState::Closed {
            return;
        }
    }
    info!("server disconnected");
    let callbacks: Vec<DisconnectCallback> =
        shared.disconnect_callbacks.lock().iter().cloned().collect();
    for callback in callbacks {
        callback();
    }

    loop {
        {
            let mut lifecycle = shared.lifecycle.lock();
            if lifecycle.locally_closed {
                return;
            }
            if lifecycle.remaining_retries == 0 {
                lifecycle.state = ConnectionState::Closed;
                info!("reconnect retries exhausted; client closed");
                return;
            }
            lifecycle.remaining_retries -= 1;
            lifecycle.state = ConnectionState::Retrying;
        }

        tokio::time::sleep(shared.config.reconnect_delay).await;
        {
            let mut lifecycle = shared.lifecycle.lock();
            if lifecycle.locally_closed {
                return;
            }
            lifecycle.state = ConnectionState::Connecting;
        }

        let attempt = {
            let mut transport = shared.transport.lock().await;
            match transport.connect().await {
                Ok(()) => Ok(transport.take_events()),
                Err(e) => Err(e),
            }
        };
        match attempt {
            Ok(Some(events)) => {
                shared.lifecycle.lock().state = ConnectionState::Open;
                info!("reconnected");
                spawn_pump(Arc::clone(&shared), events);
                return;
            }
            Ok(None) => {
                warn!("reconnect produced no event stream");
                shared.lifecycle.lock().state = ConnectionState::Retrying;
            }
            Err(e) => {
                warn!("reconnect attempt failed: {}", e);
                shared.lifecycle.lock().state = ConnectionState::Retrying;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tcp_client() -> Client {
        Client::tcp(ClientConfig::default())
    }

    #[test]
    fn test_ids_monotonic_from_one() {
        let client = tcp_client();
        for expected in 1..=3 {
            let frame = client.message("add", None, true);
            let value: Value = serde_json::from_str(frame.trim()).unwrap();
            assert_eq!(value["id"], json!(expected));
        }
    }

    #[test]
    fn test_message_shapes() {
        let client = tcp_client();
        let frame = client.message(
            "add",
            Some(Params::Array(vec![json!(1), json!(2)])),
            true,
        );
        assert!(frame.ends_with('\n'));
        let value: Value = serde_json::from_str(frame.trim()).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "method": "add", "params": [1, 2], "id": 1})
        );

        let note = client.message("tick", None, false);
        let value: Value = serde_json::from_str(note.trim()).unwrap();
        assert!(value.get("id").is_none());
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let client = tcp_client();
        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(matches!(
            client.send("add", None).await,
            Err(ClientError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let client = Client::http(ClientConfig::default()).unwrap();
        assert!(matches!(
            client.batch(Vec::new()).await,
            Err(ClientError::EmptyBatch)
        ));
    }

    #[test]
    fn test_http_client_is_stateless_open() {
        let client = Client::http(ClientConfig::default()).unwrap();
        assert_eq!(client.state(), ConnectionState::Open);
    }

    #[test]
    fn test_reserved_subscription_rejected() {
        let client = tcp_client();
        assert!(matches!(
            client.subscribe("batchResponse", |_| {}),
            Err(ClientError::ReservedEvent(_))
        ));
    }

    #[tokio::test]
    async fn test_route_frame_settles_pending_call() {
        let client = tcp_client();
        let rx = client
            .shared
            .correlations
            .register(1, std::time::Duration::from_secs(5));
        client
            .shared
            .route_frame(r#"{"jsonrpc":"2.0","result":3,"id":1}"#);
        let response = rx.await.unwrap().unwrap();
        assert_eq!(response.result, json!(3));
    }

    #[tokio::test]
    async fn test_route_body_multi_response() {
        let client = Client::http(ClientConfig::default()).unwrap();
        let rx1 = client
            .shared
            .correlations
            .register(1, std::time::Duration::from_secs(5));
        let rx2 = client
            .shared
            .correlations
            .register(2, std::time::Duration::from_secs(5));
        client.shared.route_body(
            "{\"jsonrpc\":\"2.0\",\"result\":1,\"id\":1}\n{\"jsonrpc\":\"2.0\",\"result\":2,\"id\":2}",
        );
        assert_eq!(rx1.await.unwrap().unwrap().result, json!(1));
        assert_eq!(rx2.await.unwrap().unwrap().result, json!(2));
    }
}
