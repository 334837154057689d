// WebSocket streaming source
//
// Connects once to a WebSocket server and ingests every text or binary frame
// as a JSON object. A read timeout only logs; a failed connect, a close frame,
// a protocol error or the end of the stream ends the run. There is no
// reconnect: a new run has to be started explicitly.

use crate::streaming::types::{StreamError, StreamResult};
use crate::streaming::worker::WorkerContext;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::StreamSource;

pub struct WebSocketStreamSource {
    url: String,
    read_timeout: Duration,
}

impl WebSocketStreamSource {
    pub fn new(url: String, read_timeout: Duration) -> Self {
        Self { url, read_timeout }
    }
}

#[async_trait]
impl StreamSource for WebSocketStreamSource {
    async fn run(&self, ctx: &WorkerContext) -> StreamResult<()> {
        let cancel = ctx.cancel_token();

        log::info!("Stream '{}': connecting to WebSocket {}", ctx.name(), self.url);

        let connected = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = connect_async(self.url.as_str()) => result,
        };
        let (ws_stream, _) = connected
            .map_err(|e| StreamError::Transport(format!("WebSocket connection failed: {}", e)))?;

        log::info!("Stream '{}': WebSocket connected", ctx.name());

        let (_write, mut read) = ws_stream.split();

        loop {
            let next = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    log::info!("Stream '{}': WebSocket stream cancelled", ctx.name());
                    return Ok(());
                }

                next = tokio::time::timeout(self.read_timeout, read.next()) => next,
            };

            let message = match next {
                Err(_) => {
                    let e = StreamError::Timeout(format!(
                        "no message within {}s",
                        self.read_timeout.as_secs()
                    ));
                    log::warn!("Stream '{}': WebSocket {}", ctx.name(), e);
                    ctx.record_error(&e);
                    continue;
                }
                Ok(None) => {
                    return Err(StreamError::Transport(
                        "WebSocket stream ended".to_string(),
                    ));
                }
                Ok(Some(Err(e))) => {
                    return Err(StreamError::Transport(format!("WebSocket error: {}", e)));
                }
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Text(text) => ctx.accept(text.as_bytes()),
                Message::Binary(data) => ctx.accept(&data),
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| format!("{} {}", f.code, f.reason))
                        .unwrap_or_else(|| "no close frame".to_string());
                    return Err(StreamError::Transport(format!(
                        "WebSocket closed by server: {}",
                        reason
                    )));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    // Control frames are answered by the library
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("websocket {}", self.url)
    }
}
