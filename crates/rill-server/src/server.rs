//! Server facade: one core, one transport flavor, and the listen
//! lifecycle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use rill_jsonrpc::{Codec, Notification, Params};

use crate::config::ServerConfig;
use crate::core::ServerCore;
use crate::error::{ServerError, ServerResult};
use crate::events::ClientId;
use crate::handler::{FnHandler, Handler, HandlerResult};
use crate::transport;

/// Which transport adapter a server instance runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerTransport {
    Tcp,
    Http,
    Ws,
}

/// Listen lifecycle.
///
/// ```text
/// Stopped --listen--> Starting --bound--> Listening
/// Listening --close--> Stopping --released--> Stopped
/// Any --bind error--> Stopped (with error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    Stopped,
    Starting,
    Listening,
    Stopping,
}

/// A JSON-RPC server over one transport.
///
/// Methods are registered before [`Server::listen`]; the registry is
/// read-only during dispatch. `notify` broadcasts to attached clients on
/// the stream and WebSocket transports; the HTTP transport never has
/// attached clients, so there it reaches nobody.
pub struct Server {
    core: Arc<ServerCore>,
    config: ServerConfig,
    kind: ServerTransport,
    state: Mutex<ListenState>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Server {
    /// Server over the stream transport.
    pub fn tcp(config: ServerConfig) -> Self {
        Self::with_kind(config, ServerTransport::Tcp)
    }

    /// Server over HTTP request/response cycles.
    pub fn http(config: ServerConfig) -> Self {
        Self::with_kind(config, ServerTransport::Http)
    }

    /// Server over WebSocket.
    pub fn ws(config: ServerConfig) -> Self {
        Self::with_kind(config, ServerTransport::Ws)
    }

    fn with_kind(config: ServerConfig, kind: ServerTransport) -> Self {
        let codec = Codec::new(config.version, config.delimiter.clone());
        Self {
            core: Arc::new(ServerCore::new(codec)),
            config,
            kind,
            state: Mutex::new(ListenState::Stopped),
            shutdown: Mutex::new(None),
            accept_task: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> ServerTransport {
        self.kind
    }

    pub fn listen_state(&self) -> ListenState {
        *self.state.lock()
    }

    /// The bound address once listening (useful when binding port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn client_count(&self) -> usize {
        self.core.client_count()
    }

    /// Register an async closure as a method handler.
    pub fn method<F, Fut>(&self, name: &str, handler: F) -> &Self
    where
        F: Fn(Option<Params>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler = FnHandler::new(move |params| handler(params).boxed());
        self.core.register(name, Arc::new(handler));
        self
    }

    /// Register a [`Handler`] implementation.
    pub fn register<H>(&self, name: &str, handler: H) -> &Self
    where
        H: Handler + 'static,
    {
        self.core.register(name, Arc::new(handler));
        self
    }

    /// Callback for incoming notifications of `method`.
    pub fn on_notify<F>(&self, method: &str, callback: F) -> &Self
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.core.events().on_notify(method, Arc::new(callback));
        self
    }

    pub fn client_connected<F>(&self, callback: F) -> &Self
    where
        F: Fn(ClientId) + Send + Sync + 'static,
    {
        self.core.events().client_connected(Arc::new(callback));
        self
    }

    pub fn client_disconnected<F>(&self, callback: F) -> &Self
    where
        F: Fn(ClientId) + Send + Sync + 'static,
    {
        self.core.events().client_disconnected(Arc::new(callback));
        self
    }

    pub fn on_error<F>(&self, callback: F) -> &Self
    where
        F: Fn(&ServerError) + Send + Sync + 'static,
    {
        self.core.events().on_error(Arc::new(callback));
        self
    }

    /// Server-push a notification to every attached client (stream and
    /// WebSocket transports).
    pub fn notify(&self, method: &str, params: Option<Params>) {
        self.core.notify(method, params);
    }

    /// Broadcast a notification built from a raw params value.
    pub fn notify_value(&self, method: &str, params: Value) {
        self.core.notify(method, Params::from_value(params));
    }

    /// Bind and start accepting. Not re-entrant: a second call while
    /// listening fails with [`ServerError::AlreadyListening`].
    pub async fn listen(&self) -> ServerResult<()> {
        {
            let mut state = self.state.lock();
            match *state {
                ListenState::Stopped => {}
                _ => return Err(ServerError::AlreadyListening),
            }
            *state = ListenState::Starting;
        }

        let listener = match bind_listener(&self.config).await {
            Ok(listener) => listener,
            Err(e) => {
                *self.state.lock() = ListenState::Stopped;
                return Err(e);
            }
        };
        let local = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let core = Arc::clone(&self.core);
        let kind = self.kind;
        let task = tokio::spawn(async move {
            match kind {
                ServerTransport::Tcp => transport::tcp::serve(core, listener, shutdown_rx).await,
                ServerTransport::Http => transport::http::serve(core, listener, shutdown_rx).await,
                ServerTransport::Ws => transport::ws::serve(core, listener, shutdown_rx).await,
            }
        });

        *self.shutdown.lock() = Some(shutdown_tx);
        *self.accept_task.lock() = Some(task);
        *self.local_addr.lock() = Some(local);
        *self.state.lock() = ListenState::Listening;
        info!(addr = %local, transport = ?self.kind, "server listening");
        Ok(())
    }

    /// Release the listener and disconnect attached clients.
    pub async fn close(&self) -> ServerResult<()> {
        {
            let mut state = self.state.lock();
            match *state {
                ListenState::Listening => {}
                _ => return Err(ServerError::NotListening),
            }
            *state = ListenState::Stopping;
        }

        if let Some(shutdown) = self.shutdown.lock().take() {
            let _ = shutdown.send(true);
        }
        let task = self.accept_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.core.clear_clients();
        *self.local_addr.lock() = None;
        *self.state.lock() = ListenState::Stopped;
        info!("server stopped");
        Ok(())
    }
}

async fn bind_listener(config: &ServerConfig) -> ServerResult<TcpListener> {
    let addr: SocketAddr = match config.bind_addr().parse() {
        Ok(addr) => addr,
        Err(_) => {
            // Host may be a name rather than an address.
            tokio::net::lookup_host(config.bind_addr())
                .await
                .map_err(|e| ServerError::Bind(format!("{}: {}", config.bind_addr(), e)))?
                .next()
                .ok_or_else(|| {
                    ServerError::Bind(format!("{}: no addresses resolved", config.bind_addr()))
                })?
        }
    };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    if !config.exclusive {
        socket.set_reuseaddr(true)?;
    }
    socket
        .bind(addr)
        .map_err(|e| ServerError::Bind(format!("{}: {}", addr, e)))?;
    Ok(socket.listen(1024)?)
}
