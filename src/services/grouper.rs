//! Trend grouping by calendar day or by entity id

use crate::types::{EntityKey, TrendRow, UsageRecord};
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use std::collections::HashMap;

/// Bucket key for records whose grouping field is absent
pub const MISSING_KEY: &str = "-";

/// How records are partitioned into trend rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    Day,
    ByField(EntityKey),
}

/// Partitions records into ordered trend rows.
///
/// Day keys are computed at a single fixed UTC offset so that a record near
/// midnight always lands in the same bucket regardless of the host zone.
#[derive(Debug, Clone, Copy)]
pub struct Grouper {
    offset: FixedOffset,
}

impl Default for Grouper {
    fn default() -> Self {
        Self::utc()
    }
}

impl Grouper {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn with_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Group records into trend rows.
    ///
    /// `filter` only applies to entity grouping: after grouping, rows whose key
    /// does not contain the trimmed filter are dropped.
    pub fn group_by(
        &self,
        records: &[UsageRecord],
        mode: GroupMode,
        filter: Option<&str>,
    ) -> Vec<TrendRow> {
        if records.is_empty() {
            return Vec::new();
        }

        match mode {
            GroupMode::Day => self.by_day(records),
            GroupMode::ByField(key) => Self::by_field(records, key, filter),
        }
    }

    fn by_day(&self, records: &[UsageRecord]) -> Vec<TrendRow> {
        let mut day_map: HashMap<NaiveDate, TrendRow> = HashMap::new();

        for record in records {
            let date = record.date_at(&self.offset);
            day_map
                .entry(date)
                .or_insert_with(|| TrendRow::new(date.format("%Y-%m-%d").to_string()))
                .add(record);
        }

        let mut days: Vec<(NaiveDate, TrendRow)> = day_map.into_iter().collect();
        days.sort_by_key(|(date, _)| *date);
        days.into_iter().map(|(_, row)| row).collect()
    }

    fn by_field(records: &[UsageRecord], key: EntityKey, filter: Option<&str>) -> Vec<TrendRow> {
        let mut entity_map: HashMap<String, TrendRow> = HashMap::new();

        for record in records {
            let entity = record
                .entity(key)
                .unwrap_or_else(|| MISSING_KEY.to_string());
            entity_map
                .entry(entity)
                .or_insert_with_key(|k| TrendRow::new(k.clone()))
                .add(record);
        }

        let needle = filter.map(str::trim).filter(|f| !f.is_empty());
        let mut rows: Vec<TrendRow> = entity_map
            .into_values()
            .filter(|row| needle.map_or(true, |n| row.key.contains(n)))
            .collect();

        tracing::debug!(
            field = key.field_name(),
            groups = rows.len(),
            "grouped records by entity"
        );

        rows.sort_by(|a, b| a.key.cmp(&b.key));
        rows
    }
}
