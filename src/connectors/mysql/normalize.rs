//! Conversion of driver values into JSON-safe output.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Timelike, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};

/// A single cell as decoded from the server, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Time(NaiveTime),
    Json(Value),
}

/// Column name and value pairs in select-list order.
pub type Row = Vec<(String, SqlValue)>;

fn fractional_format(has_fraction: bool, base: &str) -> String {
    if has_fraction {
        format!("{}%.f", base)
    } else {
        base.to_string()
    }
}

pub fn normalize_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Bool(b),
        SqlValue::Int(i) => Value::from(i),
        SqlValue::UInt(u) => Value::from(u),
        SqlValue::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        // Decimal's Display keeps the column scale, so 12.50 stays "12.50".
        SqlValue::Decimal(d) => Value::String(d.to_string()),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Bytes(bytes) => Value::String(STANDARD.encode(bytes)),
        SqlValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        SqlValue::DateTime(dt) => {
            let fmt = fractional_format(dt.nanosecond() != 0, "%Y-%m-%dT%H:%M:%S");
            Value::String(dt.format(&fmt).to_string())
        }
        SqlValue::Timestamp(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        SqlValue::Time(t) => {
            let fmt = fractional_format(t.nanosecond() != 0, "%H:%M:%S");
            Value::String(t.format(&fmt).to_string())
        }
        SqlValue::Json(v) => v,
    }
}

/// Normalize one row into a JSON object keyed by column name.
///
/// Duplicate column names (e.g. from a join without aliases) keep the last value.
pub fn normalize_row(row: Row) -> Map<String, Value> {
    row.into_iter()
        .map(|(column, value)| (column, normalize_value(value)))
        .collect()
}

pub fn normalize_rows(rows: Vec<Row>) -> Vec<Value> {
    rows.into_iter()
        .map(|row| Value::Object(normalize_row(row)))
        .collect()
}
