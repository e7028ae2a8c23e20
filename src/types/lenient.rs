//! Lenient field decoders for backend usage records
//!
//! Counters from the console backend may arrive as null, as strings, or not
//! at all. Every numeric decoder maps anything that is not a JSON number to
//! zero (or `None`) instead of failing the record.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::EndpointKind;

/// Accepted naive date-time layouts, read as UTC
const NAIVE_PATTERNS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

fn finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

/// Convert any JSON value to a non-negative count (non-numbers → 0)
pub fn to_count(value: &Value) -> u64 {
    if let Some(n) = value.as_u64() {
        return n;
    }
    // `as` saturates: negatives land on 0, huge values on u64::MAX
    finite(value).map(|v| v as u64).unwrap_or(0)
}

/// Convert any JSON value to a finite number, if it is one
pub fn to_amount(value: &Value) -> Option<f64> {
    finite(value)
}

/// Convert a JSON string or number to text
pub fn to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(to_count).unwrap_or(0))
}

pub fn amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(to_amount))
}

pub fn owner<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|v| v.as_i64().or_else(|| finite(v).map(|f| f as i64))))
}

pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(to_text))
}

pub fn endpoint<'de, D>(deserializer: D) -> Result<EndpointKind, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(EndpointKind::from_wire(
        value.as_ref().and_then(Value::as_str).unwrap_or_default(),
    ))
}

pub fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    };
    parsed.ok_or_else(|| D::Error::custom(format!("unreadable createdAt: {}", value)))
}

/// Parse an RFC 3339 timestamp, or a naive date-time read as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_naive_datetime(raw).map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse one of the backend's naive date-time layouts
pub fn parse_naive_datetime(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_PATTERNS
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(raw.trim(), pattern).ok())
}
