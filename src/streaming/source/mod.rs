// Pluggable data source system for streaming
//
// A source has a single capability: `run` until its context is cancelled or
// it hits a fatal error. New source kinds are added by:
// 1. Implementing the StreamSource trait
// 2. Adding a variant to SourceKind (or a scheme to SocketTransport)
// 3. Constructing it in `create_source`
//
// Current implementations:
// - WebSocket: push connection, ws:// and wss://
// - TCP: newline-delimited JSON over a raw socket, tcp://
// - Polling: periodic HTTP GET, http:// and https://

mod polling;
mod tcp;
mod websocket;

use crate::streaming::config::{SocketTransport, SourceKind, StreamConfig};
use crate::streaming::types::StreamResult;
use crate::streaming::worker::WorkerContext;
use async_trait::async_trait;

pub use polling::PollingStreamSource;
pub use tcp::TcpStreamSource;
pub use websocket::WebSocketStreamSource;

/// Trait for all streaming data sources
///
/// `run` is awaited inside the stream's worker task. It must hand every
/// decoded message to `ctx`, observe `ctx.cancel_token()` at each suspension
/// point, and return:
/// - `Ok(())` once the context is cancelled
/// - `Err(StreamError::Transport)` when the source cannot continue; the
///   registry then marks the stream stopped
///
/// Recoverable failures (bad payloads, timeouts, failed polls) are logged and
/// counted through the context and never returned.
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn run(&self, ctx: &WorkerContext) -> StreamResult<()>;

    /// Short label used in logs
    fn describe(&self) -> String;
}

/// Factory function to create a StreamSource from configuration
pub fn create_source(config: &StreamConfig) -> StreamResult<Box<dyn StreamSource>> {
    match config.source_kind {
        SourceKind::Socket => match config.socket_transport()? {
            SocketTransport::WebSocket => Ok(Box::new(WebSocketStreamSource::new(
                config.endpoint.clone(),
                config.read_timeout_duration(),
            ))),
            SocketTransport::Tcp => Ok(Box::new(TcpStreamSource::new(
                &config.endpoint,
                config.read_timeout_duration(),
            )?)),
        },

        SourceKind::Polling => Ok(Box::new(PollingStreamSource::new(
            config.endpoint.clone(),
            config.poll_interval(),
            config.read_timeout_duration(),
            config.bearer_token.clone(),
        )?)),
    }
}
