//! WebSocket server adapter.
//!
//! Each WS text message carries one delimiter-terminated frame, parsed
//! with the same framing buffer as the stream transport.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, warn};

use rill_jsonrpc::FrameBuffer;

use crate::core::ServerCore;

pub(crate) async fn serve(
    core: Arc<ServerCore>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "new websocket connection");
                    tokio::spawn(handle_connection(
                        Arc::clone(&core),
                        stream,
                        shutdown.clone(),
                    ));
                }
                Err(e) => warn!("accept failed: {}", e),
            },
        }
    }
}

async fn handle_connection(
    core: Arc<ServerCore>,
    stream: TcpStream,
    mut shutdown: watch::Receiver<bool>,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("websocket handshake failed: {}", e);
            return;
        }
    };
    let (client_id, mut outbound) = core.attach_client();
    let (mut sink, mut source) = ws.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    let mut framing = FrameBuffer::new(core.codec().delimiter());
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    for frame in framing.drain(text.as_bytes()) {
                        dispatch_frame(&core, client_id, frame);
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    for frame in framing.drain(&bytes) {
                        dispatch_frame(&core, client_id, frame);
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // ping/pong handled by the protocol layer
                Some(Err(e)) => {
                    debug!("websocket read failed: {}", e);
                    break;
                }
            },
        }
    }

    core.detach_client(client_id);
    writer.abort();
    debug!(client_id, "websocket connection closed");
}

fn dispatch_frame(core: &Arc<ServerCore>, client_id: u64, frame: String) {
    let core = Arc::clone(core);
    tokio::spawn(async move {
        if let Some(reply) = core.process_frame(&frame).await {
            if let Some(sender) = core.client_sender(client_id) {
                let _ = sender.send(reply);
            }
        }
    });
}
