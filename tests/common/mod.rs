#![allow(dead_code)]

use ddalab_ingest::{StreamRegistry, StreamStats};
use std::time::{Duration, Instant};

/// Poll `condition` until it holds, panicking after `timeout`.
pub async fn wait_for<F>(what: &str, timeout: Duration, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    while !condition() {
        if Instant::now() > deadline {
            panic!("timed out after {:?} waiting for {}", timeout, what);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub fn stats(registry: &StreamRegistry, name: &str) -> StreamStats {
    registry.stats(name).expect("registered stream")
}

/// Wait until `name` has ingested at least `count` records.
pub async fn wait_for_ingested(registry: &StreamRegistry, name: &str, count: u64) {
    wait_for(
        &format!("{} records on {}", count, name),
        Duration::from_secs(20),
        || stats(registry, name).total_ingested >= count,
    )
    .await;
}
