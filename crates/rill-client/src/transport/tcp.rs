//! Stream-socket transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use rill_jsonrpc::FrameBuffer;

use crate::error::{ClientError, ClientResult};
use crate::transport::{Transport, TransportEvent, TransportKind};

/// Client side of the stream transport: a TCP connection with
/// delimiter-framed messages and a background reader feeding the event
/// channel.
pub struct TcpTransport {
    addr: String,
    delimiter: String,
    writer: Option<OwnedWriteHalf>,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    reader: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            delimiter: delimiter.into(),
            writer: None,
            events: None,
            reader: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }

    async fn connect(&mut self) -> ClientResult<()> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| ClientError::Connect(format!("{}: {}", self.addr, e)))?;
        debug!(addr = %self.addr, "stream transport connected");

        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connected.store(true, Ordering::SeqCst);

        let connected = Arc::clone(&self.connected);
        let delimiter = self.delimiter.clone();
        self.reader = Some(tokio::spawn(read_loop(
            read_half, delimiter, tx, connected,
        )));
        self.writer = Some(write_half);
        self.events = Some(rx);
        Ok(())
    }

    async fn close(&mut self) -> ClientResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.events = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&mut self, payload: &str) -> ClientResult<Option<String>> {
        let writer = self.writer.as_mut().ok_or(ClientError::Closed)?;
        writer.write_all(payload.as_bytes()).await?;
        writer.flush().await?;
        Ok(None)
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events.take()
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    delimiter: String,
    tx: mpsc::UnboundedSender<TransportEvent>,
    connected: Arc<AtomicBool>,
) {
    let mut framing = FrameBuffer::new(&delimiter);
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for frame in framing.drain(&buf[..n]) {
                    if tx.send(TransportEvent::Frame(frame)).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                debug!("stream read failed: {}", e);
                break;
            }
        }
    }
    connected.store(false, Ordering::SeqCst);
    let _ = tx.send(TransportEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut transport = TcpTransport::new(addr.to_string(), "\n");
        assert!(matches!(
            transport.connect().await,
            Err(ClientError::Connect(_))
        ));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_frames_and_close_event() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"{\"a\":1}\n{\"b\":").await.unwrap();
            socket.write_all(b"2}\n").await.unwrap();
        });

        let mut transport = TcpTransport::new(addr.to_string(), "\n");
        transport.connect().await.unwrap();
        let mut events = transport.take_events().unwrap();

        match events.recv().await.unwrap() {
            TransportEvent::Frame(frame) => assert_eq!(frame, "{\"a\":1}"),
            other => panic!("unexpected event: {:?}", other),
        }
        match events.recv().await.unwrap() {
            TransportEvent::Frame(frame) => assert_eq!(frame, "{\"b\":2}"),
            other => panic!("unexpected event: {:?}", other),
        }
        // Server task ends and drops the socket.
        match events.recv().await.unwrap() {
            TransportEvent::Closed => {}
            other => panic!("unexpected event: {:?}", other),
        }
        server.await.unwrap();
    }
}
