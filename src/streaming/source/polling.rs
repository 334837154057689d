// HTTP polling source
//
// Issues a GET against the endpoint every `update_interval`. Any failure
// (connect, timeout, non-2xx status, undecodable body) is logged and the next
// tick is tried anyway: a polling stream only ends when it is stopped. The
// interval is fixed, with no backoff.

use crate::streaming::types::{StreamError, StreamResult};
use crate::streaming::worker::WorkerContext;
use async_trait::async_trait;
use std::time::Duration;

use super::StreamSource;

pub struct PollingStreamSource {
    endpoint: String,
    interval: Duration,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl PollingStreamSource {
    pub fn new(
        endpoint: String,
        interval: Duration,
        request_timeout: Duration,
        bearer_token: Option<String>,
    ) -> StreamResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StreamError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            interval,
            bearer_token,
            client,
        })
    }

    /// One request/ingest cycle
    async fn poll_once(&self, ctx: &WorkerContext) -> StreamResult<()> {
        let mut request = self.client.get(&self.endpoint);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StreamError::Timeout(format!("request to {} timed out", self.endpoint))
            } else {
                StreamError::Transport(format!("request to {} failed: {}", self.endpoint, e))
            }
        })?;

        let response = response
            .error_for_status()
            .map_err(|e| StreamError::Transport(format!("HTTP status: {}", e)))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| StreamError::Transport(format!("reading body failed: {}", e)))?;

        ctx.ingest_bytes(&body)
    }
}

#[async_trait]
impl StreamSource for PollingStreamSource {
    async fn run(&self, ctx: &WorkerContext) -> StreamResult<()> {
        let cancel = ctx.cancel_token();

        log::info!(
            "Stream '{}': polling {} every {}s",
            ctx.name(),
            self.endpoint,
            self.interval.as_secs()
        );

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.poll_once(ctx) => outcome,
            };

            if let Err(e) = outcome {
                // Never fatal here; the next tick retries
                if e.is_fatal() {
                    log::error!("Stream '{}': polling error: {}", ctx.name(), e);
                } else {
                    log::warn!("Stream '{}': polling error: {}", ctx.name(), e);
                }
                ctx.record_error(&e);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        log::info!("Stream '{}': polling stopped", ctx.name());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("polling {} every {}s", self.endpoint, self.interval.as_secs())
    }
}
