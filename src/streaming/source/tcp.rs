// TCP socket streaming source
//
// Connects to a TCP server and receives newline-delimited JSON (NDJSON).
// Same failure model as the WebSocket source: bad lines and read timeouts are
// recoverable, a closed or reset connection ends the run.

use crate::streaming::types::{StreamError, StreamResult};
use crate::streaming::worker::WorkerContext;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use super::StreamSource;

/// Longest accepted line; longer lines are a decode error
const MAX_LINE_BYTES: usize = 1024 * 1024;

pub struct TcpStreamSource {
    addr: String,
    read_timeout: Duration,
}

impl TcpStreamSource {
    /// `endpoint` is `tcp://host:port`
    pub fn new(endpoint: &str, read_timeout: Duration) -> StreamResult<Self> {
        let addr = endpoint
            .strip_prefix("tcp://")
            .map(|rest| rest.trim_end_matches('/'))
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| {
                StreamError::InvalidConfig(format!("not a tcp:// endpoint: {}", endpoint))
            })?;

        Ok(Self {
            addr: addr.to_string(),
            read_timeout,
        })
    }
}

#[async_trait]
impl StreamSource for TcpStreamSource {
    async fn run(&self, ctx: &WorkerContext) -> StreamResult<()> {
        let cancel = ctx.cancel_token();

        log::info!("Stream '{}': connecting to TCP {}", ctx.name(), self.addr);

        let connected = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = TcpStream::connect(&self.addr) => result,
        };
        let stream = connected
            .map_err(|e| StreamError::Transport(format!("TCP connection failed: {}", e)))?;

        log::info!("Stream '{}': TCP connected", ctx.name());

        let mut lines = FramedRead::new(stream, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

        loop {
            let next = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    log::info!("Stream '{}': TCP stream cancelled", ctx.name());
                    return Ok(());
                }

                next = tokio::time::timeout(self.read_timeout, lines.next()) => next,
            };

            match next {
                Err(_) => {
                    let e = StreamError::Timeout(format!(
                        "no line within {}s",
                        self.read_timeout.as_secs()
                    ));
                    log::warn!("Stream '{}': TCP {}", ctx.name(), e);
                    ctx.record_error(&e);
                }
                Ok(None) => {
                    return Err(StreamError::Transport(
                        "TCP connection closed by server".to_string(),
                    ));
                }
                Ok(Some(Ok(line))) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        ctx.accept(line.as_bytes());
                    }
                }
                Ok(Some(Err(LinesCodecError::MaxLineLengthExceeded))) => {
                    let e = StreamError::Decode(format!(
                        "line longer than {} bytes",
                        MAX_LINE_BYTES
                    ));
                    log::warn!("Stream '{}': message dropped: {}", ctx.name(), e);
                    ctx.record_error(&e);
                }
                Ok(Some(Err(LinesCodecError::Io(e)))) => {
                    return Err(StreamError::Transport(format!("TCP read error: {}", e)));
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("tcp {}", self.addr)
    }
}
