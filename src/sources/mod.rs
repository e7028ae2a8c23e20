//! Record sources: where usage records and precomputed summaries come from

mod file;
mod http;

pub use file::FileRecordSource;
pub use http::HttpRecordSource;

use crate::config::SourceConfig;
use crate::services::window::UsageQuery;
use crate::types::{Result, UpstreamSummary, UsageRecord, UserUsage, VoxmeterError};
use chrono::FixedOffset;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Trait for fetching usage data from a backend or local export
pub trait RecordSource: Send + Sync {
    /// Source name (e.g., "file", "http")
    fn name(&self) -> &str;

    /// Records matching the query. Failures propagate to the caller.
    fn fetch_records(&self, query: &UsageQuery) -> Result<Vec<UsageRecord>>;

    /// Precomputed summary, if the source has one
    fn fetch_summary(&self, _query: &UsageQuery) -> Result<Option<UpstreamSummary>> {
        Ok(None)
    }

    /// Precomputed per-user totals, if the source has them
    fn fetch_user_stats(&self, _query: &UsageQuery) -> Result<Vec<UserUsage>> {
        Ok(Vec::new())
    }
}

/// `{code, msg, data}` wrapper used by the console backend
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Payload of a successful response; a non-zero code is a source error
    pub fn into_data(self) -> Result<Option<T>> {
        if self.code != 0 {
            return Err(VoxmeterError::Source(format!(
                "backend returned code {}: {}",
                self.code,
                self.msg.as_deref().unwrap_or("no message")
            )));
        }
        Ok(self.data)
    }
}

/// Decode an enveloped JSON body
pub fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<Option<T>> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|e| VoxmeterError::Parse(e.to_string()))?;
    envelope.into_data()
}

/// Decode records one by one, skipping (and logging) unreadable ones
pub fn records_from_values(values: Vec<Value>, origin: &str) -> Vec<UsageRecord> {
    let total = values.len();
    let records: Vec<UsageRecord> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<UsageRecord>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(origin, error = %e, "skipping unreadable usage record");
                None
            }
        })
        .collect();
    if records.len() < total {
        tracing::warn!(
            origin,
            skipped = total - records.len(),
            kept = records.len(),
            "some usage records were skipped"
        );
    }
    records
}

/// Pick the configured source: local record files win over the backend
pub fn from_config(config: &SourceConfig, offset: FixedOffset) -> Result<Box<dyn RecordSource>> {
    if let Some(pattern) = config.records.as_deref().filter(|p| !p.trim().is_empty()) {
        return Ok(Box::new(FileRecordSource::new(pattern).with_offset(offset)));
    }
    if let Some(base_url) = config.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        let source = HttpRecordSource::new(
            base_url,
            config.token.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        return Ok(Box::new(source));
    }
    Err(VoxmeterError::Config(
        "No record source configured: set source.records or source.base_url".into(),
    ))
}
