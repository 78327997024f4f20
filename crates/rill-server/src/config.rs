//! Configuration for the server

use serde::{Deserialize, Serialize};

use rill_jsonrpc::{ProtocolVersion, DEFAULT_DELIMITER};

/// Server configuration, shared by the three transport flavors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Disallow port sharing (clears SO_REUSEADDR).
    pub exclusive: bool,
    pub version: ProtocolVersion,
    pub delimiter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            exclusive: false,
            version: ProtocolVersion::V2,
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
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

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
