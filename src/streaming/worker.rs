// Per-stream shared state and the worker task wrapper
//
// `StreamHandle` is what the registry keeps per stream: the immutable config,
// the buffer, the optional sink, lifecycle bookkeeping and counters.
// `WorkerContext` is what a running source sees. Every start opens a new run
// generation with its own cancellation token; a context whose generation is no
// longer current cannot write to the buffer or touch the lifecycle state.

use crate::streaming::buffer::RecordBuffer;
use crate::streaming::config::StreamConfig;
use crate::streaming::record::StreamRecord;
use crate::streaming::sink::{invoke_isolated, CallbackSink};
use crate::streaming::source::StreamSource;
use crate::streaming::types::{StreamError, StreamResult, StreamState, StreamStats};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Counters {
    ingested: AtomicU64,
    decode_errors: AtomicU64,
    transport_errors: AtomicU64,
    callback_errors: AtomicU64,
    read_timeouts: AtomicU64,
}

struct Lifecycle {
    state: StreamState,
    generation: u64,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
    /// Workers of earlier runs that may still be winding down
    retired: Vec<JoinHandle<()>>,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    last_stamp: Option<DateTime<Utc>>,
}

pub(crate) struct StreamHandle {
    config: StreamConfig,
    buffer: RecordBuffer,
    sink: Option<Arc<dyn CallbackSink>>,
    lifecycle: Mutex<Lifecycle>,
    counters: Counters,
}

impl StreamHandle {
    pub(crate) fn new(config: StreamConfig, sink: Option<Arc<dyn CallbackSink>>) -> Self {
        Self {
            buffer: RecordBuffer::new(config.buffer_capacity),
            config,
            sink,
            lifecycle: Mutex::new(Lifecycle {
                state: StreamState::Registered,
                generation: 0,
                cancel: None,
                task: None,
                retired: Vec::new(),
                started_at: None,
                stopped_at: None,
                last_stamp: None,
            }),
            counters: Counters::default(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.config.name
    }

    pub(crate) fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub(crate) fn buffer(&self) -> &RecordBuffer {
        &self.buffer
    }

    pub(crate) fn state(&self) -> StreamState {
        self.lifecycle.lock().state
    }

    /// Open a new run and spawn `source` on `runtime`.
    ///
    /// Returns `false` without spawning when the stream is already running.
    pub(crate) fn start(
        self: &Arc<Self>,
        runtime: &Handle,
        source: Box<dyn StreamSource>,
    ) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state.is_running() {
            return false;
        }

        lifecycle.generation += 1;
        let cancel = CancellationToken::new();
        let ctx = WorkerContext {
            handle: Arc::clone(self),
            generation: lifecycle.generation,
            cancel: cancel.clone(),
        };

        lifecycle.state = StreamState::Running;
        lifecycle.cancel = Some(cancel);
        lifecycle.started_at = Some(Utc::now());
        lifecycle.stopped_at = None;
        // A previous worker may still be winding down on its cancelled token
        lifecycle.retired.retain(|task| !task.is_finished());
        if let Some(previous) = lifecycle.task.take() {
            if !previous.is_finished() {
                lifecycle.retired.push(previous);
            }
        }
        lifecycle.task = Some(runtime.spawn(run_worker(source, ctx)));

        true
    }

    /// Mark the stream stopped and cancel the current run.
    ///
    /// Returns `false` when the stream was not running.
    pub(crate) fn stop(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if let Some(cancel) = lifecycle.cancel.take() {
            cancel.cancel();
        }
        if !lifecycle.state.is_running() {
            return false;
        }
        lifecycle.state = StreamState::Stopped;
        lifecycle.stopped_at = Some(Utc::now());
        true
    }

    /// Take the join handles of the current worker and of any superseded
    /// workers not yet finished
    pub(crate) fn take_tasks(&self) -> Vec<JoinHandle<()>> {
        let mut lifecycle = self.lifecycle.lock();
        let mut tasks: Vec<JoinHandle<()>> = lifecycle.retired.drain(..).collect();
        tasks.extend(lifecycle.task.take());
        tasks
    }

    pub(crate) fn stats(&self) -> StreamStats {
        let metrics = self.buffer.get_metrics();
        let lifecycle = self.lifecycle.lock();
        StreamStats {
            state: lifecycle.state,
            total_ingested: self.counters.ingested.load(Ordering::Relaxed),
            total_drained: metrics.total_drained,
            total_dropped: metrics.total_dropped,
            decode_errors: self.counters.decode_errors.load(Ordering::Relaxed),
            transport_errors: self.counters.transport_errors.load(Ordering::Relaxed),
            callback_errors: self.counters.callback_errors.load(Ordering::Relaxed),
            read_timeouts: self.counters.read_timeouts.load(Ordering::Relaxed),
            current_buffer_size: metrics.current_size,
            peak_buffer_size: metrics.peak_size,
            capacity: metrics.capacity,
            started_at: lifecycle.started_at,
            stopped_at: lifecycle.stopped_at,
        }
    }

    fn count_error(&self, error: &StreamError) {
        let counter = match error {
            StreamError::Decode(_) => &self.counters.decode_errors,
            StreamError::Transport(_) => &self.counters.transport_errors,
            StreamError::Callback(_) => &self.counters.callback_errors,
            StreamError::Timeout(_) => &self.counters.read_timeouts,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// What a running source uses to hand records to its stream
pub struct WorkerContext {
    handle: Arc<StreamHandle>,
    generation: u64,
    cancel: CancellationToken,
}

impl WorkerContext {
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn config(&self) -> &StreamConfig {
        self.handle.config()
    }

    /// Token cancelled when this run is stopped
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Decode a raw message body and ingest it
    pub fn ingest_bytes(&self, body: &[u8]) -> StreamResult<()> {
        let payload: Value = serde_json::from_slice(body)?;
        self.ingest(payload)
    }

    /// Ingest a raw message, logging and counting a decode failure
    pub fn accept(&self, body: &[u8]) {
        if let Err(e) = self.ingest_bytes(body) {
            log::warn!("Stream '{}': message dropped: {}", self.name(), e);
            self.record_error(&e);
        }
    }

    /// Stamp a decoded payload, store it and notify the sink.
    ///
    /// Decode errors are returned; sink failures are logged and counted but
    /// never returned, since the record is already stored by then.
    pub fn ingest(&self, payload: Value) -> StreamResult<()> {
        let record = {
            let mut lifecycle = self.handle.lifecycle.lock();
            if lifecycle.generation != self.generation
                || !lifecycle.state.is_running()
                || self.cancel.is_cancelled()
            {
                log::debug!(
                    "Stream '{}': run {} no longer active, record discarded",
                    self.name(),
                    self.generation
                );
                return Ok(());
            }

            // Wall clock may step backwards; stamps within a stream may not.
            let now = Utc::now();
            let stamp = match lifecycle.last_stamp {
                Some(last) if last > now => last,
                _ => now,
            };

            let mut record = StreamRecord::from_payload(payload, stamp)?;
            record.merge_tags(&self.handle.config.tags);

            lifecycle.last_stamp = Some(stamp);
            if self.handle.buffer.push(record.clone()).is_some() {
                log::debug!("Stream '{}': buffer full, oldest record dropped", self.name());
            }
            record
        };

        self.handle.counters.ingested.fetch_add(1, Ordering::Relaxed);

        if let Some(sink) = &self.handle.sink {
            if let Err(e) = invoke_isolated(sink.as_ref(), &record) {
                log::error!("Stream '{}': {}", self.name(), e);
                self.handle.count_error(&e);
            }
        }

        Ok(())
    }

    /// Count a recoverable error against this stream
    pub fn record_error(&self, error: &StreamError) {
        self.handle.count_error(error);
    }

    /// Called once when the source returns. A fatal exit of the current run
    /// moves the stream to `Stopped`.
    fn finish(&self) {
        let mut lifecycle = self.handle.lifecycle.lock();
        if lifecycle.generation == self.generation && lifecycle.state.is_running() {
            lifecycle.state = StreamState::Stopped;
            lifecycle.stopped_at = Some(Utc::now());
            lifecycle.cancel = None;
            log::warn!("Stream '{}' stopped by its worker", self.name());
        }
        self.cancel.cancel();
    }
}

async fn run_worker(source: Box<dyn StreamSource>, ctx: WorkerContext) {
    log::info!(
        "Stream '{}' worker started ({:?}, run {})",
        ctx.name(),
        ctx.config().source_kind,
        ctx.generation
    );

    match source.run(&ctx).await {
        Ok(()) => log::info!("Stream '{}' worker exited", ctx.name()),
        Err(e) => {
            log::error!("Stream '{}' worker terminated: {}", ctx.name(), e);
            ctx.record_error(&e);
        }
    }

    ctx.finish();
}
