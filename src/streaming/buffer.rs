// Bounded per-stream record buffer
//
// Fixed capacity FIFO with drop-oldest overflow. The owning worker pushes,
// any number of consumers drain. Push and drain take the same lock, and a
// drain holds it for at most `capacity` pops, so the producer is never held
// up for longer than one bounded drain.

use crate::streaming::record::StreamRecord;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Records reserved up front; larger buffers grow on demand up to capacity
const INITIAL_RESERVE: usize = 1024;

/// Metrics for buffer performance monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BufferMetrics {
    pub total_pushed: u64,
    pub total_drained: u64,
    pub total_dropped: u64,
    pub current_size: usize,
    pub peak_size: usize,
    pub capacity: usize,
}

/// Drop-oldest bounded buffer of stream records
pub struct RecordBuffer {
    records: Mutex<VecDeque<StreamRecord>>,
    capacity: usize,

    total_pushed: AtomicU64,
    total_drained: AtomicU64,
    total_dropped: AtomicU64,
    peak_size: AtomicUsize,
}

impl RecordBuffer {
    /// Create a buffer holding at most `capacity` records (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(INITIAL_RESERVE))),
            capacity,
            total_pushed: AtomicU64::new(0),
            total_drained: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
            peak_size: AtomicUsize::new(0),
        }
    }

    /// Append a record, evicting the oldest one if the buffer is full.
    ///
    /// Returns the evicted record, if any.
    pub fn push(&self, record: StreamRecord) -> Option<StreamRecord> {
        let (evicted, size) = {
            let mut records = self.records.lock();
            let evicted = if records.len() >= self.capacity {
                records.pop_front()
            } else {
                None
            };
            records.push_back(record);
            (evicted, records.len())
        };

        self.total_pushed.fetch_add(1, Ordering::Relaxed);
        if evicted.is_some() {
            self.total_dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.peak_size.fetch_max(size, Ordering::Relaxed);

        evicted
    }

    /// Remove and return up to `max_items` records, oldest first.
    ///
    /// Never waits: an empty buffer yields an empty vector.
    pub fn drain(&self, max_items: usize) -> Vec<StreamRecord> {
        let items: Vec<StreamRecord> = {
            let mut records = self.records.lock();
            let take = max_items.min(records.len());
            records.drain(..take).collect()
        };

        self.total_drained
            .fetch_add(items.len() as u64, Ordering::Relaxed);
        items
    }

    /// Get current number of records in buffer
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.lock().len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get current metrics
    pub fn get_metrics(&self) -> BufferMetrics {
        BufferMetrics {
            total_pushed: self.total_pushed.load(Ordering::Relaxed),
            total_drained: self.total_drained.load(Ordering::Relaxed),
            total_dropped: self.total_dropped.load(Ordering::Relaxed),
            current_size: self.len(),
            peak_size: self.peak_size.load(Ordering::Relaxed),
            capacity: self.capacity,
        }
    }

    /// Discard all buffered records, counting them as dropped.
    ///
    /// Returns how many records were discarded.
    pub fn clear(&self) -> usize {
        let discarded = {
            let mut records = self.records.lock();
            let n = records.len();
            records.clear();
            n
        };
        self.total_dropped
            .fetch_add(discarded as u64, Ordering::Relaxed);
        discarded
    }
}
