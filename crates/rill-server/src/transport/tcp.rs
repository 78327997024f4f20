//! Stream-socket server adapter.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
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
                    debug!(%peer, "new stream connection");
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
    let (client_id, mut outbound) = core.attach_client();
    let (mut read_half, mut write_half) = stream.into_split();

    // Replies and broadcasts funnel through one channel so writes on the
    // socket serialize.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if write_half.write_all(frame.as_bytes()).await.is_err() {
                break;
            }
            if write_half.flush().await.is_err() {
                break;
            }
        }
        let _ = write_half.shutdown().await;
    });

    let mut framing = FrameBuffer::new(core.codec().delimiter());
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            read = read_half.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => {
                    for frame in framing.drain(&buf[..n]) {
                        dispatch_frame(&core, client_id, frame);
                    }
                }
                Err(e) => {
                    debug!("stream read failed: {}", e);
                    break;
                }
            },
        }
    }

    core.detach_client(client_id);
    writer.abort();
    debug!(client_id, "stream connection closed");
}

/// Each frame dispatches on its own task: a slow handler blocks only its
/// own request, never the connection's read loop.
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
