//! HTTP transport: one POST per call, correlation by response body.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::transport::{Transport, TransportEvent, TransportKind};

/// Stateless HTTP transport. Every call opens a fresh request; there is
/// no Connecting/Open distinction and no inbound event channel.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    headers: HashMap<String, String>,
}

impl HttpTransport {
    /// `timeout` bounds the whole HTTP exchange; zero leaves the
    /// exchange unbounded (the per-call deadline still fires upstream).
    pub fn new(
        endpoint: &str,
        headers: HashMap<String, String>,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ClientError::Config(format!("invalid URL {:?}: {}", endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "invalid scheme for HTTP transport: {}",
                endpoint.scheme()
            )));
        }

        let mut builder = reqwest::Client::builder();
        if timeout > Duration::ZERO {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            endpoint,
            headers,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn connect(&mut self) -> ClientResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> ClientResult<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    /// POST the payload. 204 acknowledges a notification-only request
    /// (`None`). Any other status delivers its body for correlation;
    /// JSON-RPC error statuses carry the error response there.
    async fn send(&mut self, payload: &str) -> ClientResult<Option<String>> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let response = request.body(payload.to_string()).send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.text().await?;
        if body.trim().is_empty() && !status.is_success() {
            return Err(ClientError::Transport(format!(
                "HTTP {} with empty body",
                status
            )));
        }
        Ok(Some(body))
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_scheme() {
        let result = HttpTransport::new("ws://localhost:1/", HashMap::new(), Duration::ZERO);
        assert!(matches!(result, Err(ClientError::Config(_))));

        let result = HttpTransport::new("not a url", HashMap::new(), Duration::ZERO);
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_accepts_http_and_https() {
        assert!(HttpTransport::new("http://localhost:1/rpc", HashMap::new(), Duration::ZERO).is_ok());
        assert!(
            HttpTransport::new("https://localhost:1/rpc", HashMap::new(), Duration::ZERO).is_ok()
        );
    }
}
