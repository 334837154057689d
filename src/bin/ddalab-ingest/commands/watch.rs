use crate::cli::{parse_alerts, WatchArgs};
use crate::commands::resolve_config;
use crate::exit_codes;
use crate::output;
use ddalab_ingest::analytics::{detect_anomalies, evaluate_thresholds, moving_average};
use ddalab_ingest::{
    load_stream_configs, Alert, AlertConditions, Anomaly, StreamRecord, StreamRegistry,
    StreamState,
};
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct DrainReport {
    stream: String,
    state: StreamState,
    dropped: u64,
    records: Vec<StreamRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    moving_average: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    anomalies: Vec<Anomaly>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    alerts: Vec<Alert>,
}

struct Analysis {
    field: Option<String>,
    window: usize,
    zscore: Option<f64>,
    alerts: AlertConditions,
}

impl Analysis {
    fn report(&self, registry: &StreamRegistry, name: &str, batch: usize) -> Option<DrainReport> {
        let records = match registry.drain(name, batch) {
            Ok(records) => records,
            Err(e) => {
                log::error!("Drain of {} failed: {}", name, e);
                return None;
            }
        };
        let stats = registry.stats(name).ok()?;

        let (moving_average, anomalies) = match &self.field {
            Some(field) => (
                moving_average(&records, field, self.window),
                self.zscore
                    .map(|z| detect_anomalies(&records, field, z))
                    .unwrap_or_default(),
            ),
            None => (None, Vec::new()),
        };

        let mut alerts = evaluate_thresholds(&records, &self.alerts);
        for alert in &mut alerts {
            alert.stream = Some(name.to_string());
        }

        Some(DrainReport {
            stream: name.to_string(),
            state: stats.state,
            dropped: stats.total_dropped,
            records,
            moving_average,
            anomalies,
            alerts,
        })
    }
}

pub async fn execute(args: WatchArgs) -> i32 {
    let (config, path) = match resolve_config(args.streams) {
        Ok(resolved) => resolved,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let analysis = match parse_alerts(&args.alert) {
        Ok(alerts) => Analysis {
            field: args.field,
            window: args.window,
            zscore: args.zscore,
            alerts,
        },
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.drain_interval());
    let batch = args.batch.unwrap_or(config.drain_batch);
    if interval.is_zero() || batch == 0 {
        eprintln!("Error: --interval and --batch must be at least 1");
        return exit_codes::INPUT_ERROR;
    }

    let configs = match load_stream_configs(&path) {
        Ok(configs) => configs,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let registry = StreamRegistry::new();
    for stream in configs {
        let name = stream.name.clone();
        let started_on_register = stream.auto_start;
        let outcome = registry.register(stream, None).and_then(|_| {
            if started_on_register {
                Ok(())
            } else {
                registry.start(&name)
            }
        });
        if let Err(e) = outcome {
            eprintln!("Error: stream {}: {}", name, e);
            registry.close(config.shutdown_timeout()).await;
            return exit_codes::EXECUTION_ERROR;
        }
    }

    log::info!(
        "Watching {} stream(s), draining up to {} records every {:?}",
        registry.list().len(),
        batch,
        interval
    );

    let mut ticker = tokio::time::interval(interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let duration = args.duration;
    let deadline = async move {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut exit_code = exit_codes::SUCCESS;
    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                }
                log::info!("Interrupted, shutting down");
                break;
            }
            _ = &mut deadline => {
                log::info!("Duration elapsed, shutting down");
                break;
            }
            _ = ticker.tick() => {
                let reports: Vec<DrainReport> = registry
                    .list()
                    .iter()
                    .filter_map(|name| analysis.report(&registry, name, batch))
                    .collect();
                if let Some(e) = reports.iter().find_map(|r| output::emit(r, true).err()) {
                    eprintln!("Error: {}", e);
                    exit_code = exit_codes::EXECUTION_ERROR;
                    break;
                }
            }
        }
    }

    registry.close(config.shutdown_timeout()).await;
    exit_code
}
