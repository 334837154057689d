// Stream registry - owns every configured stream for its lifetime
//
// The registry manages:
// - Registration (config validation, buffer creation, optional auto-start)
// - Worker lifecycle (start, stop, stop_all, close)
// - Consumer reads (drain, snapshot, snapshot_as_table)
// - Per-stream state and statistics
//
// There is no process-wide instance: the application constructs a registry and
// passes it (usually as `Arc<StreamRegistry>`) to whatever needs it.

use crate::streaming::config::StreamConfig;
use crate::streaming::record::{RecordTable, StreamRecord};
use crate::streaming::sink::CallbackSink;
use crate::streaming::source::create_source;
use crate::streaming::types::{StreamError, StreamResult, StreamState, StreamStats};
use crate::streaming::worker::StreamHandle;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

pub struct StreamRegistry {
    streams: RwLock<HashMap<String, Arc<StreamHandle>>>,
    runtime: Option<Handle>,
}

impl StreamRegistry {
    /// Registry that spawns workers on the ambient tokio runtime
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            runtime: None,
        }
    }

    /// Registry that spawns workers on the given runtime, so it can be driven
    /// from threads outside of it
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            runtime: Some(runtime),
        }
    }

    /// Register a new stream.
    ///
    /// Starts it immediately when `config.auto_start` is set. If that start
    /// fails the stream stays registered and the error is returned.
    pub fn register(
        &self,
        config: StreamConfig,
        sink: Option<Arc<dyn CallbackSink>>,
    ) -> StreamResult<()> {
        config.validate()?;

        let name = config.name.clone();
        let auto_start = config.auto_start;

        {
            let mut streams = self.streams.write();
            if streams.contains_key(&name) {
                return Err(StreamError::DuplicateStream(name));
            }
            streams.insert(name.clone(), Arc::new(StreamHandle::new(config, sink)));
        }

        log::info!("Registered stream: {}", name);

        if auto_start {
            self.start(&name)?;
        }

        Ok(())
    }

    /// Start (or restart) a stream's worker. A no-op when already running.
    pub fn start(&self, name: &str) -> StreamResult<()> {
        let handle = self.get(name)?;

        if handle.state().is_running() {
            log::warn!("Stream {} already running", name);
            return Ok(());
        }

        let runtime = self.runtime_handle()?;
        let source = create_source(handle.config())?;
        let description = source.describe();

        if handle.start(&runtime, source) {
            log::info!("Started stream: {} ({})", name, description);
        } else {
            log::warn!("Stream {} already running", name);
        }

        Ok(())
    }

    /// Ask a stream's worker to stop.
    ///
    /// The worker notices at its next suspension point; see the crate docs
    /// for the latency bound.
    pub fn stop(&self, name: &str) -> StreamResult<()> {
        let handle = self.get(name)?;
        if handle.stop() {
            log::info!("Stopped stream: {}", name);
        } else {
            log::debug!("Stream {} was not running", name);
        }
        Ok(())
    }

    /// Stop every running stream without waiting for the workers to exit
    pub fn stop_all(&self) {
        for handle in self.handles() {
            if handle.stop() {
                log::info!("Stopped stream: {}", handle.name());
            }
        }
    }

    /// Stop every stream and wait (up to `timeout` per worker) for the workers
    /// to exit, releasing their connections.
    pub async fn close(&self, timeout: Duration) {
        self.stop_all();

        for handle in self.handles() {
            for task in handle.take_tasks() {
                match tokio::time::timeout(timeout, task).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::error!("Stream {} worker failed: {}", handle.name(), e),
                    Err(_) => log::warn!(
                        "Stream {} worker did not exit within {:?}",
                        handle.name(),
                        timeout
                    ),
                }
            }
        }

        log::info!("Stream registry closed");
    }

    /// Remove and return up to `max_count` buffered records, oldest first
    pub fn drain(&self, name: &str, max_count: usize) -> StreamResult<Vec<StreamRecord>> {
        Ok(self.get(name)?.buffer().drain(max_count))
    }

    /// Discard every buffered record of a stream, returning how many were dropped
    pub fn clear(&self, name: &str) -> StreamResult<usize> {
        let discarded = self.get(name)?.buffer().clear();
        log::debug!("Stream {}: discarded {} buffered records", name, discarded);
        Ok(discarded)
    }

    /// Consuming snapshot; identical to `drain`
    pub fn snapshot(&self, name: &str, max_count: usize) -> StreamResult<Vec<StreamRecord>> {
        self.drain(name, max_count)
    }

    /// Tabular projection of `drain`
    pub fn snapshot_as_table(&self, name: &str, max_count: usize) -> StreamResult<RecordTable> {
        let records = self.drain(name, max_count)?;
        Ok(RecordTable::from_records(&records))
    }

    pub fn state(&self, name: &str) -> StreamResult<StreamState> {
        Ok(self.get(name)?.state())
    }

    pub fn config(&self, name: &str) -> StreamResult<StreamConfig> {
        Ok(self.get(name)?.config().clone())
    }

    pub fn stats(&self, name: &str) -> StreamResult<StreamStats> {
        Ok(self.get(name)?.stats())
    }

    /// Number of records currently buffered for a stream
    pub fn buffered(&self, name: &str) -> StreamResult<usize> {
        Ok(self.get(name)?.buffer().len())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.streams.read().contains_key(name)
    }

    /// Registered stream names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.streams.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of streams currently running, sorted
    pub fn running(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .streams
            .read()
            .values()
            .filter(|h| h.state().is_running())
            .map(|h| h.name().to_string())
            .collect();
        names.sort();
        names
    }

    fn get(&self, name: &str) -> StreamResult<Arc<StreamHandle>> {
        self.streams
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StreamError::UnknownStream(name.to_string()))
    }

    fn handles(&self) -> Vec<Arc<StreamHandle>> {
        self.streams.read().values().cloned().collect()
    }

    fn runtime_handle(&self) -> StreamResult<Handle> {
        match &self.runtime {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|e| StreamError::Runtime(e.to_string())),
        }
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StreamRegistry {
    fn drop(&mut self) {
        // Workers hold their own handle; cancel them so none outlives us
        for handle in self.streams.get_mut().values() {
            handle.stop();
        }
    }
}
