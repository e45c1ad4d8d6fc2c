use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A dynamically typed value flowing through the proxy: bound as a SQL
/// parameter, or scanned back out of a result row (spec §9 "Dynamic row
/// values").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    /// Scanned byte columns are decoded as UTF-8 strings per the driver
    /// contract (§4.2 step 5) before they ever reach this variant, so this
    /// is reserved for values a caller binds directly as raw bytes.
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl RowValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RowValue::Null)
    }

    /// Render as RFC3339 if this is a timestamp, matching the driver's
    /// scan-time formatting rule (§4.2 step 5).
    pub fn as_rfc3339(&self) -> Option<String> {
        match self {
            RowValue::Timestamp(dt) => Some(dt.to_rfc3339()),
            _ => None,
        }
    }
}

impl From<RowValue> for serde_json::Value {
    fn from(v: RowValue) -> Self {
        match v {
            RowValue::Null => serde_json::Value::Null,
            RowValue::Int(i) => serde_json::json!(i),
            RowValue::Float(f) => serde_json::json!(f),
            RowValue::Bool(b) => serde_json::json!(b),
            RowValue::String(s) => serde_json::json!(s),
            RowValue::Bytes(b) => serde_json::json!(String::from_utf8_lossy(&b)),
            RowValue::Timestamp(dt) => serde_json::json!(dt.to_rfc3339()),
            RowValue::Json(j) => j,
        }
    }
}

/// A single result row: an ordered mapping from column name to value.
///
/// `BTreeMap` gives deterministic column ordering in tests and logs; the
/// wire order of columns in the JSON response is controlled separately by
/// the driver, which preserves the database's own column order (spec §3:
/// "data: ordered sequence of rows").
pub type Row = BTreeMap<String, RowValue>;

/// Convert a row to a `serde_json::Map` in insertion order for response serialisation.
pub fn row_to_json(row: &Row) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = row
        .iter()
        .map(|(k, v)| (k.clone(), v.clone().into()))
        .collect();
    serde_json::Value::Object(map)
}
