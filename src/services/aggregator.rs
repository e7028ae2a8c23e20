//! Aggregator service for computing usage statistics

use crate::types::{KindBreakdown, SummaryStats, UpstreamSummary, UsageRecord, UserUsage};
use std::collections::HashMap;

/// Where a summary's numbers came from
#[derive(Debug, Clone, PartialEq)]
pub enum SummarySource {
    /// The backend's precomputed summary, taken as the source of truth
    Trusted(UpstreamSummary),
    /// Derived from the record list because no usable summary was supplied
    Derived(SummaryStats),
}

impl SummarySource {
    /// Trust `upstream` when its `totalCalls` is a finite number, otherwise derive from records
    pub fn resolve(records: &[UsageRecord], upstream: Option<UpstreamSummary>) -> Self {
        match upstream {
            Some(summary) if summary.is_usable() => SummarySource::Trusted(summary),
            _ => {
                tracing::debug!(
                    records = records.len(),
                    "no usable upstream summary, deriving from records"
                );
                SummarySource::Derived(Aggregator::derive(records))
            }
        }
    }

    pub fn stats(&self) -> SummaryStats {
        match self {
            SummarySource::Trusted(upstream) => SummaryStats::from_upstream(upstream),
            SummarySource::Derived(stats) => *stats,
        }
    }

    pub fn is_trusted(&self) -> bool {
        matches!(self, SummarySource::Trusted(_))
    }
}

/// Aggregator for computing usage statistics
pub struct Aggregator;

impl Aggregator {
    /// Summary for a record list, preferring a usable upstream summary
    pub fn compute_summary(
        records: &[UsageRecord],
        upstream: Option<UpstreamSummary>,
    ) -> SummaryStats {
        SummarySource::resolve(records, upstream).stats()
    }

    /// Single-pass summary derived purely from records
    pub fn derive(records: &[UsageRecord]) -> SummaryStats {
        let mut stats = SummaryStats::default();
        for record in records {
            stats.add(record);
        }
        stats.record_count = records.len() as u64;
        stats
    }

    /// Duration and cost split by endpoint kind
    pub fn breakdown(records: &[UsageRecord]) -> KindBreakdown {
        let mut breakdown = KindBreakdown::default();
        for record in records {
            breakdown.add(record);
        }
        breakdown
    }

    /// Per-user totals (records without an owner are skipped), sorted by user id
    pub fn by_user(records: &[UsageRecord]) -> Vec<UserUsage> {
        if records.is_empty() {
            return Vec::new();
        }

        let mut user_map: HashMap<i64, UserUsage> = HashMap::new();
        for record in records {
            let Some(user_id) = record.owner_user_id else {
                continue;
            };
            user_map
                .entry(user_id)
                .or_insert_with(|| UserUsage::new(user_id))
                .add(record);
        }

        let mut result: Vec<UserUsage> = user_map.into_values().collect();
        result.sort_by_key(|u| u.user_id);
        result
    }

    /// Prefer the backend's per-user list unless it is empty
    pub fn resolve_by_user(records: &[UsageRecord], upstream: Vec<UserUsage>) -> Vec<UserUsage> {
        if upstream.is_empty() {
            Self::by_user(records)
        } else {
            upstream
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EndpointKind;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn make_record(
        kind: EndpointKind,
        chars: u64,
        calls: u64,
        duration: u64,
        owner: Option<i64>,
    ) -> UsageRecord {
        UsageRecord {
            owner_user_id: owner,
            cost_chars: chars,
            cost_calls: calls,
            duration_ms: duration,
            ..UsageRecord::new(kind, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
        }
    }

    fn scenario_records() -> Vec<UsageRecord> {
        vec![
            UsageRecord {
                cost_chars: 100,
                cost_calls: 1,
                duration_ms: 500,
                ..UsageRecord::new(
                    EndpointKind::Tts,
                    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
                )
            },
            UsageRecord {
                cost_chars: 50,
                cost_calls: 1,
                duration_ms: 300,
                ..UsageRecord::new(
                    EndpointKind::Clone,
                    Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap(),
                )
            },
        ]
    }

    fn upstream(value: serde_json::Value) -> UpstreamSummary {
        serde_json::from_value(value).unwrap()
    }

    // ========== compute_summary() tests ==========

    #[test]
    fn test_compute_summary_empty() {
        let result = Aggregator::compute_summary(&[], None);
        assert_eq!(result, SummaryStats::default());
        assert_eq!(result.record_count, 0);
    }

    #[test]
    fn test_compute_summary_scenario() {
        let result = Aggregator::compute_summary(&scenario_records(), None);

        assert_eq!(result.total_chars, 150);
        assert_eq!(result.total_calls, 2);
        assert_eq!(result.total_duration, 800);
        assert_eq!(result.tts_chars, 100);
        assert_eq!(result.clone_chars, 50);
        assert_eq!(result.record_count, 2);
    }

    #[test]
    fn test_compute_summary_partition_conservation() {
        let records = vec![
            make_record(EndpointKind::Tts, 10, 1, 5, None),
            make_record(EndpointKind::Clone, 20, 3, 5, None),
            make_record(EndpointKind::Tts, 0, 0, 0, None),
            make_record(EndpointKind::Clone, 7, 2, 1, Some(4)),
            make_record(EndpointKind::Tts, 1000, 5, 10, Some(4)),
        ];

        let result = Aggregator::compute_summary(&records, None);

        assert_eq!(result.total_calls, result.tts_calls + result.clone_calls);
        assert_eq!(result.total_chars, result.tts_chars + result.clone_chars);
        assert_eq!(result.record_count, 5);
    }

    #[test]
    fn test_compute_summary_trusts_usable_upstream() {
        let summary = upstream(json!({"totalCalls": 99, "totalChars": 1234, "recordCount": 40}));

        let result = Aggregator::compute_summary(&scenario_records(), Some(summary));

        assert_eq!(result.total_calls, 99);
        assert_eq!(result.total_chars, 1234);
        assert_eq!(result.record_count, 40);
        // Missing upstream fields read as zero, not as record-derived values
        assert_eq!(result.tts_chars, 0);
    }

    #[test]
    fn test_compute_summary_falls_back_on_placeholder() {
        let summary = upstream(json!({"totalCalls": null, "totalChars": 1234}));

        let result = Aggregator::compute_summary(&scenario_records(), Some(summary));

        assert_eq!(result.total_calls, 2);
        assert_eq!(result.total_chars, 150);
        assert_eq!(result.record_count, 2);
    }

    #[test]
    fn test_compute_summary_idempotent() {
        let records = scenario_records();
        assert_eq!(
            Aggregator::compute_summary(&records, None),
            Aggregator::compute_summary(&records, None)
        );
    }

    // ========== SummarySource tests ==========

    #[test]
    fn test_summary_source_tags() {
        let records = scenario_records();

        let derived = SummarySource::resolve(&records, None);
        assert!(!derived.is_trusted());
        assert_eq!(derived.stats().total_calls, 2);

        let unusable = SummarySource::resolve(&records, Some(upstream(json!({"totalCalls": "?"}))));
        assert!(matches!(unusable, SummarySource::Derived(_)));

        let trusted = SummarySource::resolve(&[], Some(upstream(json!({"totalCalls": 0}))));
        assert!(trusted.is_trusted());
        assert_eq!(trusted.stats(), SummaryStats::default());
    }

    // ========== breakdown() tests ==========

    #[test]
    fn test_breakdown_with_none_cost() {
        let mut tts = make_record(EndpointKind::Tts, 1, 1, 400, None);
        tts.cost_amount = Some(0.01);
        let clone = make_record(EndpointKind::Clone, 1, 1, 600, None);

        let result = Aggregator::breakdown(&[tts, clone]);

        assert_eq!(result.tts_duration_ms, 400);
        assert_eq!(result.clone_duration_ms, 600);
        // None cost should be treated as 0.0
        assert!((result.clone_cost - 0.0).abs() < f64::EPSILON);
        assert!((result.total_cost() - 0.01).abs() < f64::EPSILON);
    }

    // ========== by_user() tests ==========

    #[test]
    fn test_by_user_empty() {
        assert!(Aggregator::by_user(&[]).is_empty());
    }

    #[test]
    fn test_by_user_skips_ownerless_and_sorts_numerically() {
        let records = vec![
            make_record(EndpointKind::Tts, 10, 1, 0, Some(10)),
            make_record(EndpointKind::Clone, 5, 1, 0, Some(2)),
            make_record(EndpointKind::Tts, 7, 1, 0, None),
            make_record(EndpointKind::Clone, 3, 2, 0, Some(10)),
        ];

        let result = Aggregator::by_user(&records);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].user_id, 2);
        assert_eq!(result[1].user_id, 10);
        assert_eq!(result[1].total_chars, 13);
        assert_eq!(result[1].total_calls, 3);
        assert_eq!(result[1].tts_calls, 1);
        assert_eq!(result[1].clone_calls, 2);
        assert_eq!(result[1].record_count, 2);
    }

    #[test]
    fn test_resolve_by_user_prefers_upstream() {
        let records = vec![make_record(EndpointKind::Tts, 10, 1, 0, Some(1))];
        let mut remote = UserUsage::new(77);
        remote.total_calls = 9;

        let result = Aggregator::resolve_by_user(&records, vec![remote.clone()]);
        assert_eq!(result, vec![remote]);

        let fallback = Aggregator::resolve_by_user(&records, Vec::new());
        assert_eq!(fallback.len(), 1);
        assert_eq!(fallback[0].user_id, 1);
    }
}
