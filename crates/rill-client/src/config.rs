//! Configuration types for the client

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rill_jsonrpc::{ProtocolVersion, DEFAULT_DELIMITER};

/// Client configuration.
///
/// `timeout`, `reconnect_delay` and the seconds-based setters convert to
/// millisecond-resolution [`Duration`]s internally; the serialized form
/// carries milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Host for the stream transport; also used to derive HTTP/WS URLs
    /// when `url` is not set.
    pub host: String,
    pub port: u16,
    /// Explicit endpoint URL for the HTTP and WebSocket transports.
    pub url: Option<String>,
    pub version: ProtocolVersion,
    pub delimiter: String,
    /// Per-call deadline for `send` and `batch`.
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Reconnect attempts after a remote close (stream/WS).
    pub retries: u32,
    /// Delay between reconnect attempts.
    #[serde(with = "duration_serde")]
    pub reconnect_delay: Duration,
    pub http: HttpOptions,
    pub ws: WsOptions,
}

/// HTTP transport options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpOptions {
    /// Request path appended when the URL is derived from host/port.
    pub path: String,
    /// Extra headers sent with every request.
    pub headers: HashMap<String, String>,
}

/// WebSocket transport options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WsOptions {
    /// Request per-message compression. The underlying WebSocket stack
    /// does not negotiate the extension; the client logs and proceeds
    /// uncompressed when this is set.
    pub per_message_deflate: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            url: None,
            version: ProtocolVersion::V2,
            delimiter: DEFAULT_DELIMITER.to_string(),
            timeout: Duration::from_secs(60),
            retries: 2,
            reconnect_delay: Duration::from_secs(5),
            http: HttpOptions {
                path: "/".to_string(),
                headers: HashMap::new(),
            },
            ws: WsOptions::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn version(mut self, version: ProtocolVersion) -> Self {
        self.version = version;
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Per-call timeout in seconds (stored with millisecond resolution).
    pub fn timeout_secs(mut self, seconds: f64) -> Self {
        self.timeout = Duration::from_millis((seconds * 1000.0) as u64);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Delay between reconnect attempts, in seconds.
    pub fn reconnect_delay_secs(mut self, seconds: f64) -> Self {
        self.reconnect_delay = Duration::from_millis((seconds * 1000.0) as u64);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.http.headers.insert(name.into(), value.into());
        self
    }

    pub fn http_path(mut self, path: impl Into<String>) -> Self {
        self.http.path = path.into();
        self
    }

    pub fn per_message_deflate(mut self, enable: bool) -> Self {
        self.ws.per_message_deflate = enable;
        self
    }

    /// Stream transport address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Endpoint for the HTTP transport.
    pub fn http_url(&self) -> String {
        self.url.clone().unwrap_or_else(|| {
            let path = self.http.path.trim_start_matches('/');
            format!("http://{}:{}/{}", self.host, self.port, path)
        })
    }

    /// Endpoint for the WebSocket transport.
    pub fn ws_url(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| format!("ws://{}:{}", self.host, self.port))
    }
}

// Durations serialize as whole milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.version, ProtocolVersion::V2);
        assert_eq!(config.delimiter, "\n");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retries, 2);
    }

    #[test]
    fn test_timeout_seconds_to_millis() {
        let config = ClientConfig::default().timeout_secs(1.5);
        assert_eq!(config.timeout, Duration::from_millis(1500));
        let zero = ClientConfig::default().timeout_secs(0.0);
        assert_eq!(zero.timeout, Duration::ZERO);
    }

    #[test]
    fn test_derived_urls() {
        let config = ClientConfig::new("localhost", 9000);
        assert_eq!(config.addr(), "localhost:9000");
        assert_eq!(config.http_url(), "http://localhost:9000/");
        assert_eq!(config.ws_url(), "ws://localhost:9000");

        let explicit = ClientConfig::default().with_url("http://example.com/rpc");
        assert_eq!(explicit.http_url(), "http://example.com/rpc");
    }

    #[test]
    fn test_config_serialization() {
        let config = ClientConfig::default().timeout_secs(1.5);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"timeout\":1500"));
        let parsed: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.timeout, Duration::from_millis(1500));
    }
}
