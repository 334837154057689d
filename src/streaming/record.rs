// Records produced by stream workers and their tabular projection
//
// A record is the decoded JSON object received from a source plus the
// `ingested_at` stamp added by the worker. Consumers see it as one flat
// object; the stamp is always rendered as fixed-width RFC 3339 UTC so that
// text ordering matches time ordering.

use crate::streaming::types::{StreamError, StreamResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Name of the field carrying the ingestion timestamp
pub const INGESTED_AT: &str = "ingested_at";

/// A single ingested record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(
        rename = "ingested_at",
        serialize_with = "serialize_stamp",
        deserialize_with = "deserialize_stamp"
    )]
    ingested_at: DateTime<Utc>,

    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl StreamRecord {
    /// Build a record from already-decoded fields. A payload-supplied
    /// `ingested_at` is replaced by the worker's stamp.
    pub fn new(mut fields: Map<String, Value>, ingested_at: DateTime<Utc>) -> Self {
        fields.remove(INGESTED_AT);
        Self {
            ingested_at,
            fields,
        }
    }

    /// Build a record from a decoded payload, which must be a JSON object
    pub fn from_payload(payload: Value, ingested_at: DateTime<Utc>) -> StreamResult<Self> {
        match payload {
            Value::Object(fields) => Ok(Self::new(fields, ingested_at)),
            other => Err(StreamError::Decode(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn ingested_at(&self) -> DateTime<Utc> {
        self.ingested_at
    }

    /// The stamp in its wire format
    pub fn ingested_at_text(&self) -> String {
        format_stamp(&self.ingested_at)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Numeric value of a field, if present and a JSON number
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Insert static tags; keys already present in the payload win
    pub fn merge_tags(&mut self, tags: &Map<String, Value>) {
        for (key, value) in tags {
            if key == INGESTED_AT {
                continue;
            }
            self.fields
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Flat JSON object including `ingested_at`
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert(
            INGESTED_AT.to_string(),
            Value::String(self.ingested_at_text()),
        );
        Value::Object(object)
    }
}

fn format_stamp(stamp: &DateTime<Utc>) -> String {
    stamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn serialize_stamp<S: Serializer>(stamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_stamp(stamp))
}

fn deserialize_stamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let text = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Tabular projection of a batch of records
///
/// Columns are the union of record keys in first-seen order, with
/// `ingested_at` last. Missing cells are `Null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RecordTable {
    pub fn from_records(records: &[StreamRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.fields.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns.push(INGESTED_AT.to_string());

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| {
                        if column == INGESTED_AT {
                            Value::String(record.ingested_at_text())
                        } else {
                            record.get(column).cloned().unwrap_or(Value::Null)
                        }
                    })
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Numeric view of one column; non-numeric cells are `None`
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.column(name)
            .map(|cells| cells.into_iter().map(Value::as_f64).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn stamp(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_payload_must_be_object() {
        let err = StreamRecord::from_payload(json!([1, 2, 3]), stamp(0)).unwrap_err();
        assert!(matches!(err, StreamError::Decode(_)));

        let record = StreamRecord::from_payload(json!({"x": 1}), stamp(0)).unwrap();
        assert_eq!(record.get_f64("x"), Some(1.0));
    }

    #[test]
    fn test_worker_stamp_replaces_payload_stamp() {
        let record =
            StreamRecord::from_payload(json!({"ingested_at": "yesterday", "x": 2}), stamp(5))
                .unwrap();
        assert!(!record.contains(INGESTED_AT));

        let value = record.to_value();
        assert_eq!(value["ingested_at"], "2023-11-14T22:13:25.000000Z");
        assert_eq!(value["x"], 2);
    }

    #[test]
    fn test_serialized_record_is_flat() {
        let record = StreamRecord::from_payload(json!({"price": 10.5}), stamp(0)).unwrap();
        let text = serde_json::to_string(&record).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back["price"], 10.5);
        assert_eq!(back["ingested_at"], "2023-11-14T22:13:20.000000Z");

        let parsed: StreamRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_tags_do_not_override_payload() {
        let mut record =
            StreamRecord::from_payload(json!({"symbol": "AAPL", "p": 1}), stamp(0)).unwrap();
        let mut tags = Map::new();
        tags.insert("symbol".into(), json!("MSFT"));
        tags.insert("source".into(), json!("finnhub"));
        record.merge_tags(&tags);

        assert_eq!(record.get("symbol"), Some(&json!("AAPL")));
        assert_eq!(record.get("source"), Some(&json!("finnhub")));
    }

    #[test]
    fn test_table_projection() {
        let records = vec![
            StreamRecord::from_payload(json!({"a": 1, "b": "x"}), stamp(0)).unwrap(),
            StreamRecord::from_payload(json!({"b": "y", "c": true}), stamp(1)).unwrap(),
        ];
        let table = RecordTable::from_records(&records);

        assert_eq!(table.columns, vec!["a", "b", "c", "ingested_at"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1][0], Value::Null);
        assert_eq!(table.rows[1][2], json!(true));
        assert_eq!(table.numeric_column("a").unwrap(), vec![Some(1.0), None]);
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn test_empty_table() {
        let table = RecordTable::from_records(&[]);
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
    }
}
