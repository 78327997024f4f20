//! WebSocket transport.
//!
//! Each WS text message carries a single delimiter-terminated frame; the
//! delimiter is preserved on the wire so both ends parse symmetrically
//! with the same framing buffer as the stream transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use rill_jsonrpc::FrameBuffer;

use crate::error::{ClientError, ClientResult};
use crate::transport::{Transport, TransportEvent, TransportKind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsTransport {
    url: String,
    delimiter: String,
    per_message_deflate: bool,
    writer: Option<SplitSink<WsStream, Message>>,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    reader: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
}

impl WsTransport {
    pub fn new(
        url: impl Into<String>,
        delimiter: impl Into<String>,
        per_message_deflate: bool,
    ) -> ClientResult<Self> {
        let url = url.into();
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            return Err(ClientError::Config(format!(
                "invalid URL for WebSocket transport: {:?}",
                url
            )));
        }
        Ok(Self {
            url,
            delimiter: delimiter.into(),
            per_message_deflate,
            writer: None,
            events: None,
            reader: None,
            connected: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Ws
    }

    async fn connect(&mut self) -> ClientResult<()> {
        if self.per_message_deflate {
            warn!("per-message deflate is not negotiated by this transport; continuing uncompressed");
        }

        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ClientError::Connect(format!("{}: {}", self.url, e)))?;
        debug!(url = %self.url, "websocket transport connected");

        let (sink, source) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connected.store(true, Ordering::SeqCst);

        let connected = Arc::clone(&self.connected);
        let delimiter = self.delimiter.clone();
        self.reader = Some(tokio::spawn(read_loop(source, delimiter, tx, connected)));
        self.writer = Some(sink);
        self.events = Some(rx);
        Ok(())
    }

    async fn close(&mut self) -> ClientResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.send(Message::Close(None)).await;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.events = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&mut self, payload: &str) -> ClientResult<Option<String>> {
        let writer = self.writer.as_mut().ok_or(ClientError::Closed)?;
        writer
            .send(Message::Text(payload.to_string()))
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(None)
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events.take()
    }
}

async fn read_loop(
    mut source: SplitStream<WsStream>,
    delimiter: String,
    tx: mpsc::UnboundedSender<TransportEvent>,
    connected: Arc<AtomicBool>,
) {
    let mut framing = FrameBuffer::new(&delimiter);
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => {
                for frame in framing.drain(text.as_bytes()) {
                    if tx.send(TransportEvent::Frame(frame)).is_err() {
                        return;
                    }
                }
            }
            Ok(Message::Binary(bytes)) => {
                for frame in framing.drain(&bytes) {
                    if tx.send(TransportEvent::Frame(frame)).is_err() {
                        return;
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ping/pong handled by the protocol layer
            Err(e) => {
                debug!("websocket read failed: {}", e);
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
    let _ = tx.send(TransportEvent::Closed);
}
