mod common;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use common::{stats, wait_for, wait_for_ingested};
use ddalab_ingest::{StreamConfig, StreamRecord, StreamRegistry, StreamState};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral port and return its base URL.
async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

/// Counts requests; answers `{"tick": n}` for the first `limit`, then 503
async fn limited_ticks(State((hits, limit)): State<(Arc<AtomicU64>, u64)>) -> Response {
    let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
    if n <= limit {
        Json(json!({ "tick": n })).into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

fn tick_server(limit: u64) -> (Router, Arc<AtomicU64>) {
    let hits = Arc::new(AtomicU64::new(0));
    let router = Router::new()
        .route("/tick", get(limited_ticks))
        .with_state((Arc::clone(&hits), limit));
    (router, hits)
}

fn ticks(records: &[StreamRecord]) -> Vec<u64> {
    records
        .iter()
        .map(|r| r.get("tick").and_then(|v| v.as_u64()).expect("tick"))
        .collect()
}

#[tokio::test]
async fn test_polling_keeps_most_recent_ticks() {
    let (router, _) = tick_server(7);
    let base = serve(router).await;

    let registry = StreamRegistry::new();
    registry
        .register(
            StreamConfig::polling("ticks", format!("{}/tick", base))
                .with_update_interval(1)
                .with_buffer_capacity(5),
            None,
        )
        .unwrap();
    assert_eq!(registry.state("ticks").unwrap(), StreamState::Running);

    wait_for_ingested(&registry, "ticks", 7).await;

    let records = registry.drain("ticks", 5).unwrap();
    assert_eq!(ticks(&records), vec![3, 4, 5, 6, 7]);
    assert!(records
        .windows(2)
        .all(|pair| pair[0].ingested_at() <= pair[1].ingested_at()));
    assert_eq!(registry.buffered("ticks").unwrap(), 0);

    let stats = stats(&registry, "ticks");
    assert_eq!(stats.total_dropped, 2);
    assert_eq!(stats.state, StreamState::Running);

    registry.close(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_polling_survives_failed_ticks() {
    let hits = Arc::new(AtomicU64::new(0));
    let router = Router::new()
        .route(
            "/flaky",
            get(|State(hits): State<Arc<AtomicU64>>| async move {
                match hits.fetch_add(1, Ordering::SeqCst) + 1 {
                    1 | 2 => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                    3 => (StatusCode::OK, "not json").into_response(),
                    4 => Json(json!([1, 2, 3])).into_response(),
                    n => Json(json!({ "value": n })).into_response(),
                }
            }),
        )
        .with_state(Arc::clone(&hits));
    let base = serve(router).await;

    let registry = StreamRegistry::new();
    registry
        .register(
            StreamConfig::polling("flaky", format!("{}/flaky", base)).with_update_interval(1),
            None,
        )
        .unwrap();

    wait_for_ingested(&registry, "flaky", 1).await;

    let stats = stats(&registry, "flaky");
    assert_eq!(stats.state, StreamState::Running);
    assert_eq!(stats.transport_errors, 2);
    assert_eq!(stats.decode_errors, 2);

    let records = registry.drain("flaky", 10).unwrap();
    assert_eq!(records[0].get("value"), Some(&json!(5)));

    registry.close(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_stop_then_start_resumes() {
    let (router, hits) = tick_server(u64::MAX);
    let base = serve(router).await;

    let registry = StreamRegistry::new();
    registry
        .register(
            StreamConfig::polling("ticks", format!("{}/tick", base))
                .with_update_interval(1)
                .with_auto_start(false),
            None,
        )
        .unwrap();
    assert_eq!(registry.state("ticks").unwrap(), StreamState::Registered);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    registry.start("ticks").unwrap();
    wait_for_ingested(&registry, "ticks", 1).await;

    registry.stop("ticks").unwrap();
    assert_eq!(registry.state("ticks").unwrap(), StreamState::Stopped);
    let ingested_at_stop = stats(&registry, "ticks").total_ingested;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(stats(&registry, "ticks").total_ingested, ingested_at_stop);
    registry.drain("ticks", usize::MAX).unwrap();

    registry.start("ticks").unwrap();
    assert_eq!(registry.state("ticks").unwrap(), StreamState::Running);
    wait_for_ingested(&registry, "ticks", ingested_at_stop + 1).await;
    assert!(!registry.drain("ticks", 10).unwrap().is_empty());

    registry.close(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_second_start_does_not_add_worker() {
    let (router, hits) = tick_server(u64::MAX);
    let base = serve(router).await;

    let registry = StreamRegistry::new();
    registry
        .register(
            StreamConfig::polling("ticks", format!("{}/tick", base)).with_update_interval(1),
            None,
        )
        .unwrap();
    registry.start("ticks").unwrap();
    registry.start("ticks").unwrap();

    // One worker polls at t = 0, 1, 2, 3; two would double that
    tokio::time::sleep(Duration::from_millis(3500)).await;
    let requests = hits.load(Ordering::SeqCst);
    assert!((3..=5).contains(&requests), "{} requests", requests);

    registry.close(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_sink_sees_tagged_records_and_failures_are_isolated() {
    let tagged_base = serve(tick_server(u64::MAX).0).await;
    let panicky_base = serve(tick_server(u64::MAX).0).await;

    let seen: Arc<Mutex<Vec<StreamRecord>>> = Arc::new(Mutex::new(Vec::new()));
    let collector = Arc::clone(&seen);

    let registry = StreamRegistry::new();
    registry
        .register(
            StreamConfig::polling("tagged", format!("{}/tick", tagged_base))
                .with_update_interval(1)
                .with_tag("site", "lab-2"),
            Some(Arc::new(move |record: &StreamRecord| -> anyhow::Result<()> {
                collector.lock().push(record.clone());
                anyhow::ensure!(record.get("tick") != Some(&json!(1)), "first tick rejected");
                Ok(())
            })),
        )
        .unwrap();
    registry
        .register(
            StreamConfig::polling("panicky", format!("{}/tick", panicky_base)).with_update_interval(1),
            Some(Arc::new(|_: &StreamRecord| -> anyhow::Result<()> {
                panic!("sink blew up")
            })),
        )
        .unwrap();

    wait_for_ingested(&registry, "tagged", 2).await;
    wait_for_ingested(&registry, "panicky", 2).await;

    let stored = registry.drain("tagged", 10).unwrap();
    assert!(stored.len() >= 2);
    assert!(stored.iter().all(|r| r.get("site") == Some(&json!("lab-2"))));
    assert_eq!(seen.lock()[0], stored[0]);
    assert_eq!(stats(&registry, "tagged").callback_errors, 1);

    wait_for("panicking sink counted", Duration::from_secs(5), || {
        stats(&registry, "panicky").callback_errors >= 2
    })
    .await;
    assert_eq!(registry.state("panicky").unwrap(), StreamState::Running);
    assert!(registry.drain("panicky", 10).unwrap().len() >= 2);

    registry.close(Duration::from_secs(5)).await;
}

/// Answers only requests carrying `Authorization: Bearer sesame`
async fn guarded(headers: axum::http::HeaderMap) -> Response {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer sesame") => Json(json!({ "ok": true })).into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[tokio::test]
async fn test_polling_sends_bearer_token() {
    let base = serve(Router::new().route("/guarded", get(guarded))).await;

    let registry = StreamRegistry::new();
    registry
        .register(
            StreamConfig::polling("authed", format!("{}/guarded", base))
                .with_update_interval(1)
                .with_bearer_token("sesame"),
            None,
        )
        .unwrap();
    registry
        .register(
            StreamConfig::polling("anonymous", format!("{}/guarded", base)).with_update_interval(1),
            None,
        )
        .unwrap();

    wait_for_ingested(&registry, "authed", 1).await;
    wait_for("rejected poll", Duration::from_secs(20), || {
        stats(&registry, "anonymous").transport_errors >= 1
    })
    .await;

    let records = registry.drain("authed", 10).unwrap();
    assert!(records.iter().all(|r| r.get("ok") == Some(&json!(true))));
    assert_eq!(stats(&registry, "authed").transport_errors, 0);
    assert_eq!(stats(&registry, "anonymous").total_ingested, 0);

    registry.close(Duration::from_secs(5)).await;
}
