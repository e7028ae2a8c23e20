//! Local record files (backend exports saved as JSON or JSONL)

use chrono::{FixedOffset, Offset, Utc};
use rayon::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::{records_from_values, Envelope, RecordSource};
use crate::services::window::UsageQuery;
use crate::types::{Result, UsageRecord, VoxmeterError};

/// Reads usage records from every file matching a glob pattern.
///
/// `.jsonl` files hold one record per line; any other file is a JSON array of
/// records or a `{code, msg, data}` envelope around one.
pub struct FileRecordSource {
    pattern: String,
    offset: FixedOffset,
}

impl FileRecordSource {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            offset: Utc.fix(),
        }
    }

    /// Offset used to interpret bare window dates
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Collect all files matching the glob pattern
    pub fn collect_files(&self) -> Vec<PathBuf> {
        glob::glob(&self.pattern)
            .map(|paths| {
                paths
                    .filter_map(|e| e.ok())
                    .filter(|p| p.is_file())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parse a single file and return its records
    pub fn parse_file(&self, path: &Path) -> Result<Vec<UsageRecord>> {
        let mut content = fs::read(path)?;
        let origin = path.display().to_string();

        let is_jsonl = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));

        let values = if is_jsonl {
            Self::parse_lines(&mut content, &origin)
        } else {
            Self::parse_document(&mut content)?
        };

        Ok(records_from_values(values, &origin))
    }

    fn parse_lines(content: &mut [u8], origin: &str) -> Vec<Value> {
        content
            .split_mut(|b| *b == b'\n')
            .enumerate()
            .filter(|(_, line)| !line.iter().all(u8::is_ascii_whitespace))
            .filter_map(|(idx, line)| match simd_json::from_slice::<Value>(line) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(origin, line = idx + 1, error = %e, "skipping malformed line");
                    None
                }
            })
            .collect()
    }

    fn parse_document(content: &mut [u8]) -> Result<Vec<Value>> {
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let document: Value =
            simd_json::from_slice(content).map_err(|e| VoxmeterError::Parse(e.to_string()))?;

        match document {
            Value::Array(values) => Ok(values),
            Value::Object(_) => {
                let envelope: Envelope<Vec<Value>> = serde_json::from_value(document)
                    .map_err(|e| VoxmeterError::Parse(e.to_string()))?;
                Ok(envelope.into_data()?.unwrap_or_default())
            }
            _ => Err(VoxmeterError::Parse(
                "expected an array of records or a {code, data} envelope".into(),
            )),
        }
    }

    /// Parse all files in parallel; unreadable files are logged and skipped
    pub fn load_all(&self) -> Vec<UsageRecord> {
        let files = self.collect_files();
        if files.is_empty() {
            tracing::warn!(pattern = %self.pattern, "no record files matched");
        }

        files
            .par_iter()
            .flat_map(|f| match self.parse_file(f) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(file = %f.display(), error = %e, "failed to parse record file");
                    Vec::new()
                }
            })
            .collect()
    }
}

impl RecordSource for FileRecordSource {
    fn name(&self) -> &str {
        "file"
    }

    /// Apply the query locally: owner, endpoint and window filters, newest
    /// first, truncated to the limit
    fn fetch_records(&self, query: &UsageQuery) -> Result<Vec<UsageRecord>> {
        let window = query
            .bounds
            .as_ref()
            .map(|b| b.to_window(&self.offset))
            .transpose()?;

        let mut records: Vec<UsageRecord> = self
            .load_all()
            .into_iter()
            .filter(|r| query.matches(r, window.as_ref()))
            .collect();

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit.filter(|l| *l > 0) {
            records.truncate(limit);
        }
        Ok(records)
    }
}
