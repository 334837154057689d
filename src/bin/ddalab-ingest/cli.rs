use clap::{Args, Parser, Subcommand};
use ddalab_ingest::{AlertConditions, ThresholdCondition};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "ddalab-ingest",
    version,
    about = "Live data ingestion with bounded stream buffers",
    long_about = "Ingest live records from WebSocket, TCP and HTTP polling sources.\n\
                  Stream definitions are a JSON array; set $INGEST_STREAMS_FILE or use --streams."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check a stream definitions file
    Validate(ValidateArgs),
    /// Run every stream and print periodic drains with analytics
    Watch(WatchArgs),
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Stream definitions file (JSON array)
    #[arg(long)]
    pub streams: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Stream definitions file (JSON array)
    #[arg(long)]
    pub streams: Option<PathBuf>,

    /// Seconds between drains
    #[arg(long)]
    pub interval: Option<u64>,

    /// Maximum records drained per stream per interval
    #[arg(long)]
    pub batch: Option<usize>,

    /// Numeric field to analyse
    #[arg(long)]
    pub field: Option<String>,

    /// Moving average window in records
    #[arg(long, default_value_t = 10, requires = "field")]
    pub window: usize,

    /// Report records whose z-score reaches this value
    #[arg(long, requires = "field")]
    pub zscore: Option<f64>,

    /// Threshold alert as "field:min:max"; either bound may be empty
    #[arg(long, num_args = 1..)]
    pub alert: Vec<String>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration: Option<u64>,
}

/// Parse one alert spec "field:min:max" into a field name and its bounds.
pub fn parse_alert(spec: &str) -> Result<(String, ThresholdCondition), String> {
    let mut parts = spec.rsplitn(3, ':');
    let (Some(max), Some(min), Some(field)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!(
            "Invalid alert '{}': expected 'field:min:max'",
            spec
        ));
    };

    let field = field.trim();
    if field.is_empty() {
        return Err(format!("Invalid alert '{}': field name is empty", spec));
    }

    let bound = |raw: &str| -> Result<Option<f64>, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<f64>()
            .map(Some)
            .map_err(|_| format!("Invalid alert '{}': '{}' is not a number", spec, raw))
    };

    let condition = ThresholdCondition {
        min: bound(min)?,
        max: bound(max)?,
    };
    if condition.min.is_none() && condition.max.is_none() {
        return Err(format!("Invalid alert '{}': no bound given", spec));
    }
    if let (Some(lo), Some(hi)) = (condition.min, condition.max) {
        if lo > hi {
            return Err(format!("Invalid alert '{}': min is greater than max", spec));
        }
    }

    Ok((field.to_string(), condition))
}

/// Parse all alert specs; a later spec for the same field replaces an earlier one.
pub fn parse_alerts(specs: &[String]) -> Result<AlertConditions, String> {
    specs.iter().map(|s| parse_alert(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alert_valid() {
        let (field, condition) = parse_alert("temperature:0:100").unwrap();
        assert_eq!(field, "temperature");
        assert_eq!(condition, ThresholdCondition::new(0.0, 100.0));

        let (_, upper) = parse_alert("pressure::5.5").unwrap();
        assert_eq!(upper.min, None);
        assert_eq!(upper.max, Some(5.5));

        let (field, lower) = parse_alert("sensor:a:-1:").unwrap();
        assert_eq!(field, "sensor:a");
        assert_eq!(lower.min, Some(-1.0));
    }

    #[test]
    fn test_parse_alert_invalid() {
        assert!(parse_alert("temperature").is_err());
        assert!(parse_alert("temperature:0").is_err());
        assert!(parse_alert(":0:1").is_err());
        assert!(parse_alert("t:x:1").is_err());
        assert!(parse_alert("t::").is_err());
        assert!(parse_alert("t:5:1").is_err());
    }

    #[test]
    fn test_parse_alerts() {
        let specs = vec!["a:0:1".to_string(), "b::2".to_string()];
        let conditions = parse_alerts(&specs).unwrap();
        assert_eq!(conditions.len(), 2);
        assert!(conditions.contains_key("a"));
    }
}
