// Stream configuration
//
// A `StreamConfig` is supplied once at registration and never changes
// afterwards. `validate` is run by the registry before anything is created.

use crate::streaming::types::{StreamError, StreamResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Reference read/request timeout in seconds
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Kind of source a stream ingests from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Long-lived push connection (WebSocket or TCP)
    #[serde(alias = "websocket")]
    Socket,

    /// Periodic HTTP GET
    #[serde(alias = "api_polling")]
    Polling,
}

/// Concrete transport behind a socket endpoint, chosen by URI scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketTransport {
    WebSocket,
    Tcp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    /// Unique stream name
    pub name: String,

    pub source_kind: SourceKind,

    /// Source URI (`ws://`, `wss://`, `tcp://` for sockets; `http(s)://` for polling)
    pub endpoint: String,

    /// Seconds between polls; ignored for socket streams
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,

    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    #[serde(default = "default_auto_start")]
    pub auto_start: bool,

    /// Socket read timeout / polling request timeout, in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,

    /// Static fields merged into every record of this stream
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub tags: Map<String, Value>,

    /// Sent as `Authorization: Bearer ...` on every poll; ignored for socket streams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

fn default_update_interval() -> u64 {
    60
}
fn default_buffer_capacity() -> usize {
    1000
}
fn default_auto_start() -> bool {
    true
}
fn default_read_timeout() -> u64 {
    DEFAULT_READ_TIMEOUT_SECS
}

impl StreamConfig {
    /// Socket stream with default settings
    pub fn socket(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::with_kind(name.into(), SourceKind::Socket, endpoint.into())
    }

    /// Polling stream with default settings
    pub fn polling(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::with_kind(name.into(), SourceKind::Polling, endpoint.into())
    }

    fn with_kind(name: String, source_kind: SourceKind, endpoint: String) -> Self {
        Self {
            name,
            source_kind,
            endpoint,
            update_interval: default_update_interval(),
            buffer_capacity: default_buffer_capacity(),
            auto_start: default_auto_start(),
            read_timeout: default_read_timeout(),
            tags: Map::new(),
            bearer_token: None,
        }
    }

    pub fn with_update_interval(mut self, secs: u64) -> Self {
        self.update_interval = secs;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn with_read_timeout(mut self, secs: u64) -> Self {
        self.read_timeout = secs;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }

    pub fn read_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    /// Transport for a socket endpoint
    pub fn socket_transport(&self) -> StreamResult<SocketTransport> {
        match scheme(&self.endpoint) {
            Some("ws") | Some("wss") => Ok(SocketTransport::WebSocket),
            Some("tcp") => Ok(SocketTransport::Tcp),
            _ => Err(StreamError::InvalidConfig(format!(
                "stream '{}': socket endpoint must use ws://, wss:// or tcp://, got '{}'",
                self.name, self.endpoint
            ))),
        }
    }

    /// Check the invariants a stream needs before it can be registered
    pub fn validate(&self) -> StreamResult<()> {
        if self.name.trim().is_empty() {
            return Err(StreamError::InvalidConfig(
                "stream name must not be empty".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(StreamError::InvalidConfig(format!(
                "stream '{}': buffer_capacity must be at least 1",
                self.name
            )));
        }
        if self.read_timeout == 0 {
            return Err(StreamError::InvalidConfig(format!(
                "stream '{}': read_timeout must be at least 1 second",
                self.name
            )));
        }

        match self.source_kind {
            SourceKind::Socket => {
                self.socket_transport()?;
            }
            SourceKind::Polling => {
                if self.update_interval == 0 {
                    return Err(StreamError::InvalidConfig(format!(
                        "stream '{}': update_interval must be at least 1 second",
                        self.name
                    )));
                }
                if !matches!(scheme(&self.endpoint), Some("http") | Some("https")) {
                    return Err(StreamError::InvalidConfig(format!(
                        "stream '{}': polling endpoint must use http:// or https://, got '{}'",
                        self.name, self.endpoint
                    )));
                }
            }
        }

        Ok(())
    }
}

fn scheme(endpoint: &str) -> Option<&str> {
    endpoint
        .split_once("://")
        .filter(|(_, rest)| !rest.is_empty())
        .map(|(scheme, _)| scheme)
}
