// Per-stream record observers
//
// A sink is called synchronously by the worker after a record has been
// stored. Whatever it does, ingestion has already completed: errors and
// panics are caught here, reported as `StreamError::Callback`, and the worker
// carries on.

use crate::streaming::record::StreamRecord;
use crate::streaming::types::{StreamError, StreamResult};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Observer invoked once per ingested record
pub trait CallbackSink: Send + Sync {
    fn on_record(&self, record: &StreamRecord) -> anyhow::Result<()>;
}

impl<F> CallbackSink for F
where
    F: Fn(&StreamRecord) -> anyhow::Result<()> + Send + Sync,
{
    fn on_record(&self, record: &StreamRecord) -> anyhow::Result<()> {
        self(record)
    }
}

/// Call a sink, converting both errors and panics into `StreamError::Callback`
pub fn invoke_isolated(sink: &dyn CallbackSink, record: &StreamRecord) -> StreamResult<()> {
    match catch_unwind(AssertUnwindSafe(|| sink.on_record(record))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(StreamError::Callback(format!("{:#}", e))),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(StreamError::Callback(format!("sink panicked: {}", message)))
        }
    }
}
