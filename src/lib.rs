//! Live data ingestion for DDALAB.
//!
//! A [`StreamRegistry`] owns any number of named streams. Each running stream
//! has one tokio task that reads from its source (WebSocket, TCP NDJSON, or
//! HTTP polling), stamps every decoded JSON object with `ingested_at`, and
//! pushes it into a bounded drop-oldest buffer. Consumers drain buffers on
//! their own schedule and hand the records to [`analytics`].
//!
//! Stopping is cooperative. A worker checks its cancellation token at every
//! suspension point (connect, read, request, inter-poll sleep) and before each
//! buffer write, so after `stop` returns at most the record already being
//! decoded is still processed, and it is discarded rather than stored.
//!
//! ```no_run
//! use ddalab_ingest::{StreamConfig, StreamRegistry};
//!
//! # async fn demo() -> Result<(), ddalab_ingest::StreamError> {
//! let registry = StreamRegistry::new();
//! registry.register(StreamConfig::polling("weather", "http://localhost:8080/now"), None)?;
//!
//! let latest = registry.drain("weather", 10)?;
//! println!("{} records", latest.len());
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod config;
pub mod presets;
pub mod streaming;

pub use analytics::{Alert, AlertConditions, Anomaly, FieldSummary, StreamAnalyzer, ThresholdCondition};
pub use config::{load_stream_configs, ConfigError, IngestConfig};
pub use streaming::{
    CallbackSink, RecordTable, SourceKind, StreamConfig, StreamError, StreamRecord, StreamRegistry,
    StreamResult, StreamState, StreamStats,
};
