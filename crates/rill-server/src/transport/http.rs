//! HTTP server adapter: hyper http1, one JSON-RPC exchange per request.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming as IncomingBody;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, warn};

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
                    debug!(%peer, "new http connection");
                    let core = Arc::clone(&core);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |request| {
                            handle_request(Arc::clone(&core), request)
                        });
                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            // Clients dropping keep-alive connections is routine.
                            if err.to_string().contains("connection closed") {
                                debug!("client disconnected: {}", err);
                            } else {
                                debug!("error serving connection: {}", err);
                            }
                        }
                    });
                }
                Err(e) => warn!("accept failed: {}", e),
            },
        }
    }
}

async fn handle_request(
    core: Arc<ServerCore>,
    request: Request<IncomingBody>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if request.method() != Method::POST {
        return Ok(plain_response(StatusCode::METHOD_NOT_ALLOWED));
    }

    let body = match request.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("failed to read request body: {}", e);
            return Ok(plain_response(StatusCode::BAD_REQUEST));
        }
    };
    let text = String::from_utf8_lossy(&body);

    let (status, reply) = core.process_http_body(&text).await;
    let status =
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = match reply {
        Some(reply) => {
            let mut response = Response::new(Full::new(Bytes::from(reply)));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/json"),
            );
            response
        }
        None => Response::new(Full::new(Bytes::new())),
    };
    *response.status_mut() = status;
    Ok(response)
}

fn plain_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
