//! CSV serialization for usage detail reports
//!
//! Produces the textual report only; delivery (BOM + download sink) lives in
//! [`crate::services::download`].

use chrono::{FixedOffset, Offset, Utc};
use csv::{Terminator, WriterBuilder};

use crate::types::{Result, UsageRecord, VoxmeterError};

/// Rendering of `created time` cells
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const LEADING_COLUMNS: [&str; 5] = [
    "created time",
    "endpoint kind",
    "chars",
    "calls",
    "duration(ms)",
];
const OWNER_COLUMN: &str = "owner id";
const TRAILING_COLUMNS: [&str; 3] = ["agent id", "slot id", "cost"];

/// Header row, with the owner column only for administrative exports
pub fn header(include_owner_column: bool) -> Vec<&'static str> {
    let mut columns = LEADING_COLUMNS.to_vec();
    if include_owner_column {
        columns.push(OWNER_COLUMN);
    }
    columns.extend(TRAILING_COLUMNS);
    columns
}

/// Serialize records with timestamps rendered in UTC
pub fn build_csv(records: &[UsageRecord], include_owner_column: bool) -> Result<String> {
    CsvExporter::utc().build(records, include_owner_column)
}

/// CSV exporter rendering timestamps at a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct CsvExporter {
    offset: FixedOffset,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::utc()
    }
}

impl CsvExporter {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn with_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Header line plus one line per record, each terminated by `\n`.
    /// Fields are quoted only when they contain a comma, quote or newline.
    pub fn build(&self, records: &[UsageRecord], include_owner_column: bool) -> Result<String> {
        let mut wtr = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_writer(vec![]);

        wtr.write_record(header(include_owner_column))
            .map_err(|e| VoxmeterError::Export(e.to_string()))?;

        for record in records {
            wtr.write_record(self.row(record, include_owner_column))
                .map_err(|e| VoxmeterError::Export(e.to_string()))?;
        }

        let bytes = wtr
            .into_inner()
            .map_err(|e| VoxmeterError::Export(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| VoxmeterError::Export(e.to_string()))
    }

    fn row(&self, record: &UsageRecord, include_owner_column: bool) -> Vec<String> {
        let mut fields = vec![
            record
                .created_at
                .with_timezone(&self.offset)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            record.endpoint_kind.as_str().to_string(),
            record.cost_chars.to_string(),
            record.cost_calls.to_string(),
            record.duration_ms.to_string(),
        ];
        if include_owner_column {
            fields.push(
                record
                    .owner_user_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            );
        }
        fields.push(record.agent_id.clone().unwrap_or_default());
        fields.push(record.slot_id.clone().unwrap_or_default());
        fields.push(record.cost().to_string());
        fields
    }
}
