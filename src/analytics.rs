//! Streaming analytics over record snapshots.
//!
//! The free functions are pure: they read a fixed slice of records and never
//! touch a buffer, so every record in one call is scored against the same
//! statistics. [`StreamAnalyzer`] is a convenience wrapper that drains a
//! registered stream first and then applies one of them.

use crate::streaming::{StreamRecord, StreamRegistry, StreamResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Records drained by [`StreamAnalyzer::detect_anomalies`]
pub const ANOMALY_SNAPSHOT_SIZE: usize = 100;

/// Records drained by [`StreamAnalyzer::generate_alerts`]
pub const ALERT_SNAPSHOT_SIZE: usize = 10;

/// A record whose value lies far from the snapshot mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub z_score: f64,
}

/// Inclusive bounds for one field; a missing bound is open
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCondition {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl ThresholdCondition {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Whether `value` lies outside `[min, max]`
    pub fn is_breached_by(&self, value: f64) -> bool {
        self.min.is_some_and(|min| value < min) || self.max.is_some_and(|max| value > max)
    }
}

/// Field name to bounds, evaluated in name order
pub type AlertConditions = BTreeMap<String, ThresholdCondition>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ThresholdBreach,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    pub field: String,
    pub value: f64,
    pub condition: ThresholdCondition,
    pub timestamp: DateTime<Utc>,
    pub kind: AlertKind,
}

/// Descriptive statistics of one numeric field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
}

fn numeric_values<'a>(
    records: &'a [StreamRecord],
    field: &'a str,
) -> impl Iterator<Item = (&'a StreamRecord, f64)> + 'a {
    records
        .iter()
        .filter_map(move |r| r.get_f64(field).map(|v| (r, v)))
}

/// Mean and population standard deviation, `None` for no values
fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

/// Mean of `field` over the last `window` records of `records`.
///
/// `None` when the window is empty or holds no numeric value for the field;
/// callers must not read that as zero.
pub fn moving_average(records: &[StreamRecord], field: &str, window: usize) -> Option<f64> {
    let start = records.len().saturating_sub(window);
    let values: Vec<f64> = numeric_values(&records[start..], field)
        .map(|(_, v)| v)
        .collect();
    mean_and_std(&values).map(|(mean, _)| mean)
}

/// Records whose z-score for `field` reaches `threshold`.
///
/// Mean and population standard deviation come from the whole snapshot. A
/// zero standard deviation scores every record 0.
pub fn detect_anomalies(records: &[StreamRecord], field: &str, threshold: f64) -> Vec<Anomaly> {
    let values: Vec<f64> = numeric_values(records, field).map(|(_, v)| v).collect();
    let Some((mean, std_dev)) = mean_and_std(&values) else {
        return Vec::new();
    };

    numeric_values(records, field)
        .filter_map(|(record, value)| {
            let z_score = if std_dev > 0.0 {
                (value - mean).abs() / std_dev
            } else {
                0.0
            };
            (z_score >= threshold).then(|| Anomaly {
                timestamp: record.ingested_at(),
                value,
                z_score,
            })
        })
        .collect()
}

/// Check the latest record against `conditions`.
///
/// Fields missing from the latest record, or not numeric there, are skipped.
pub fn evaluate_thresholds(records: &[StreamRecord], conditions: &AlertConditions) -> Vec<Alert> {
    let Some(latest) = records.last() else {
        return Vec::new();
    };

    conditions
        .iter()
        .filter_map(|(field, condition)| {
            let value = latest.get_f64(field)?;
            condition.is_breached_by(value).then(|| Alert {
                stream: None,
                field: field.clone(),
                value,
                condition: *condition,
                timestamp: latest.ingested_at(),
                kind: AlertKind::ThresholdBreach,
            })
        })
        .collect()
}

/// Count, range, mean and standard deviation of `field`
pub fn summarize(records: &[StreamRecord], field: &str) -> Option<FieldSummary> {
    let values: Vec<f64> = numeric_values(records, field).map(|(_, v)| v).collect();
    let (mean, std_dev) = mean_and_std(&values)?;
    Some(FieldSummary {
        count: values.len(),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean,
        std_dev,
    })
}

/// Runs the analytics against live streams of a registry.
///
/// Each call drains the records it analyses; they are not returned to the
/// buffer.
#[derive(Clone)]
pub struct StreamAnalyzer {
    registry: Arc<StreamRegistry>,
}

impl StreamAnalyzer {
    pub fn new(registry: Arc<StreamRegistry>) -> Self {
        Self { registry }
    }

    /// Average of `field` over the newest `window` buffered records. The whole
    /// buffer is drained so the window ends at the latest record.
    pub fn moving_average(
        &self,
        stream: &str,
        field: &str,
        window: usize,
    ) -> StreamResult<Option<f64>> {
        let records = self.registry.drain(stream, usize::MAX)?;
        Ok(moving_average(&records, field, window))
    }

    pub fn detect_anomalies(
        &self,
        stream: &str,
        field: &str,
        threshold: f64,
    ) -> StreamResult<Vec<Anomaly>> {
        let records = self.registry.drain(stream, ANOMALY_SNAPSHOT_SIZE)?;
        Ok(detect_anomalies(&records, field, threshold))
    }

    pub fn generate_alerts(
        &self,
        stream: &str,
        conditions: &AlertConditions,
    ) -> StreamResult<Vec<Alert>> {
        let records = self.registry.drain(stream, ALERT_SNAPSHOT_SIZE)?;
        let mut alerts = evaluate_thresholds(&records, conditions);
        for alert in &mut alerts {
            alert.stream = Some(stream.to_string());
        }
        Ok(alerts)
    }
}
