//! Report service: one fetch, every view of the result
//!
//! Records are fetched once per query; summary, trend, per-user totals and
//! the CSV export are all computed from the same snapshot.

use chrono::FixedOffset;

use super::aggregator::{Aggregator, SummarySource};
use super::csv_export::CsvExporter;
use super::download::{download_csv, CsvEmitter};
use super::grouper::{GroupMode, Grouper};
use super::window::{Scope, UsageQuery};
use crate::sources::RecordSource;
use crate::types::{
    KindBreakdown, Result, SummaryStats, TrendRow, UpstreamSummary, UsageRecord, UserUsage,
};

pub struct ReportService {
    source: Box<dyn RecordSource>,
    grouper: Grouper,
    exporter: CsvExporter,
}

impl ReportService {
    pub fn new(source: Box<dyn RecordSource>) -> Self {
        Self {
            source,
            grouper: Grouper::utc(),
            exporter: CsvExporter::utc(),
        }
    }

    /// Offset used for day buckets and CSV timestamps
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.grouper = Grouper::with_offset(offset);
        self.exporter = CsvExporter::with_offset(offset);
        self
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch records and statistics for `query`.
    ///
    /// A failed record fetch fails the report. Failed statistics fetches are
    /// logged and treated as absent, so totals fall back to the records.
    pub fn load(&self, query: &UsageQuery) -> Result<UsageReport> {
        let records = self.source.fetch_records(query)?;

        let upstream_summary = self.source.fetch_summary(query).unwrap_or_else(|e| {
            tracing::warn!(source = self.source.name(), error = %e, "summary unavailable");
            None
        });

        let upstream_users = self.source.fetch_user_stats(query).unwrap_or_else(|e| {
            tracing::warn!(source = self.source.name(), error = %e, "per-user statistics unavailable");
            Vec::new()
        });

        tracing::debug!(
            source = self.source.name(),
            records = records.len(),
            has_summary = upstream_summary.is_some(),
            "loaded usage report"
        );

        Ok(UsageReport {
            scope: query.scope,
            records,
            upstream_summary,
            upstream_users,
            grouper: self.grouper,
            exporter: self.exporter,
        })
    }
}

/// Snapshot of one query's records and upstream statistics
#[derive(Debug, Clone)]
pub struct UsageReport {
    scope: Scope,
    records: Vec<UsageRecord>,
    upstream_summary: Option<UpstreamSummary>,
    upstream_users: Vec<UserUsage>,
    grouper: Grouper,
    exporter: CsvExporter,
}

impl UsageReport {
    pub fn new(scope: Scope, records: Vec<UsageRecord>) -> Self {
        Self {
            scope,
            records,
            upstream_summary: None,
            upstream_users: Vec::new(),
            grouper: Grouper::utc(),
            exporter: CsvExporter::utc(),
        }
    }

    pub fn with_upstream_summary(mut self, summary: Option<UpstreamSummary>) -> Self {
        self.upstream_summary = summary;
        self
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn records(&self) -> &[UsageRecord] {
        &self.records
    }

    pub fn summary_source(&self) -> SummarySource {
        SummarySource::resolve(&self.records, self.upstream_summary.clone())
    }

    pub fn summary(&self) -> SummaryStats {
        self.summary_source().stats()
    }

    pub fn breakdown(&self) -> KindBreakdown {
        Aggregator::breakdown(&self.records)
    }

    pub fn trend(&self, mode: GroupMode, filter: Option<&str>) -> Vec<TrendRow> {
        self.grouper.group_by(&self.records, mode, filter)
    }

    pub fn users(&self) -> Vec<UserUsage> {
        Aggregator::resolve_by_user(&self.records, self.upstream_users.clone())
    }

    /// Detail CSV; administrative reports carry the owner column
    pub fn to_csv(&self) -> Result<String> {
        self.exporter.build(&self.records, self.scope.is_admin())
    }

    /// Hand the detail CSV to `emitter` under the scope's filename
    pub fn export<E>(&self, emitter: &mut E) -> Result<&'static str>
    where
        E: CsvEmitter + ?Sized,
    {
        self.export_as(emitter, self.scope.export_filename())
    }

    pub fn export_as<'a, E>(&self, emitter: &mut E, filename: &'a str) -> Result<&'a str>
    where
        E: CsvEmitter + ?Sized,
    {
        let csv = self.to_csv()?;
        download_csv(emitter, filename, &csv)?;
        Ok(filename)
    }
}
