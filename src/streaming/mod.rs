// Live stream ingestion module
//
// This module provides infrastructure for connecting to live data sources,
// buffering the most recent records per stream, and handing them to
// consumers on demand.
//
// Architecture:
// - `config`: Immutable per-stream configuration and validation
// - `source`: Trait-based system for pluggable sources (WebSocket, TCP, HTTP polling)
// - `worker`: Per-run context that stamps, stores and forwards records
// - `buffer`: Bounded drop-oldest record buffers
// - `sink`: Optional per-stream observers with failure isolation
// - `registry`: Lifecycle management and consumer reads

pub mod buffer;
pub mod config;
pub mod record;
pub mod registry;
pub mod sink;
pub mod source;
pub mod types;
pub mod worker;

pub use buffer::{BufferMetrics, RecordBuffer};
pub use config::{SocketTransport, SourceKind, StreamConfig, DEFAULT_READ_TIMEOUT_SECS};
pub use record::{RecordTable, StreamRecord, INGESTED_AT};
pub use registry::StreamRegistry;
pub use sink::CallbackSink;
pub use source::{create_source, StreamSource};
pub use types::{StreamError, StreamResult, StreamState, StreamStats};
pub use worker::WorkerContext;
