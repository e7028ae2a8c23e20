//! Usage types for TTS / voice-clone billing

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::lenient;

/// Billing category of a usage record.
///
/// The backend only distinguishes `tts`; anything else is billed as a clone call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Tts,
    #[default]
    Clone,
}

impl EndpointKind {
    pub fn from_wire(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("tts") {
            EndpointKind::Tts
        } else {
            EndpointKind::Clone
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Tts => "tts",
            EndpointKind::Clone => "clone",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record field used as a trend-row discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    UserId,
    AgentId,
    SlotId,
}

impl EntityKey {
    pub fn field_name(&self) -> &'static str {
        match self {
            EntityKey::UserId => "userId",
            EntityKey::AgentId => "agentId",
            EntityKey::SlotId => "slotId",
        }
    }
}

/// One billable usage event as returned by the console backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: Option<String>,
    /// Only present when the caller has administrative scope
    #[serde(
        rename = "userId",
        alias = "ownerUserId",
        default,
        deserialize_with = "lenient::owner"
    )]
    pub owner_user_id: Option<i64>,
    #[serde(
        rename = "endpoint",
        alias = "endpointKind",
        default,
        deserialize_with = "lenient::endpoint"
    )]
    pub endpoint_kind: EndpointKind,
    #[serde(default, deserialize_with = "lenient::count")]
    pub cost_chars: u64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub cost_calls: u64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub duration_ms: u64,
    #[serde(
        rename = "cost",
        alias = "costAmount",
        default,
        deserialize_with = "lenient::amount"
    )]
    pub cost_amount: Option<f64>,
    #[serde(deserialize_with = "lenient::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub agent_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub slot_id: Option<String>,
}

impl UsageRecord {
    /// Record with every counter at zero and no optional fields
    pub fn new(endpoint_kind: EndpointKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            owner_user_id: None,
            endpoint_kind,
            cost_chars: 0,
            cost_calls: 0,
            duration_ms: 0,
            cost_amount: None,
            created_at,
            agent_id: None,
            slot_id: None,
        }
    }

    pub fn cost(&self) -> f64 {
        self.cost_amount.unwrap_or(0.0)
    }

    /// Calendar date of `created_at` at a fixed UTC offset
    pub fn date_at(&self, offset: &FixedOffset) -> NaiveDate {
        self.created_at.with_timezone(offset).date_naive()
    }

    /// Text value of an entity field, `None` when the record lacks it
    pub fn entity(&self, key: EntityKey) -> Option<String> {
        match key {
            EntityKey::UserId => self.owner_user_id.map(|id| id.to_string()),
            EntityKey::AgentId => self.agent_id.clone(),
            EntityKey::SlotId => self.slot_id.clone(),
        }
    }
}

/// Aggregate over a record list
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_chars: u64,
    pub total_calls: u64,
    pub total_duration: u64,
    pub record_count: u64,
    pub tts_chars: u64,
    pub tts_calls: u64,
    pub clone_chars: u64,
    pub clone_calls: u64,
}

impl SummaryStats {
    pub fn add(&mut self, record: &UsageRecord) {
        self.total_chars = self.total_chars.saturating_add(record.cost_chars);
        self.total_calls = self.total_calls.saturating_add(record.cost_calls);
        self.total_duration = self.total_duration.saturating_add(record.duration_ms);
        match record.endpoint_kind {
            EndpointKind::Tts => {
                self.tts_chars = self.tts_chars.saturating_add(record.cost_chars);
                self.tts_calls = self.tts_calls.saturating_add(record.cost_calls);
            }
            EndpointKind::Clone => {
                self.clone_chars = self.clone_chars.saturating_add(record.cost_chars);
                self.clone_calls = self.clone_calls.saturating_add(record.cost_calls);
            }
        }
    }

    /// Take the backend's numbers as-is; absent or non-numeric fields read as 0.
    /// Values that are not whole non-negative counts are rounded (negatives to 0)
    /// and logged.
    pub fn from_upstream(upstream: &UpstreamSummary) -> Self {
        Self {
            total_chars: upstream_count("totalChars", upstream.total_chars),
            total_calls: upstream_count("totalCalls", upstream.total_calls),
            total_duration: upstream_count("totalDuration", upstream.total_duration),
            record_count: upstream_count("recordCount", upstream.record_count),
            tts_chars: upstream_count("ttsChars", upstream.tts_chars),
            tts_calls: upstream_count("ttsCalls", upstream.tts_calls),
            clone_chars: upstream_count("cloneChars", upstream.clone_chars),
            clone_calls: upstream_count("cloneCalls", upstream.clone_calls),
        }
    }
}

fn upstream_count(field: &'static str, value: Option<f64>) -> u64 {
    let Some(n) = value else {
        return 0;
    };
    let count = n.round().max(0.0);
    if count != n {
        tracing::debug!(field, value = n, count, "upstream summary value is not a whole count");
    }
    // `as` saturates above u64::MAX
    count as u64
}

/// Precomputed summary as sent by the backend; any field may be missing,
/// null or a non-numeric placeholder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSummary {
    #[serde(default, deserialize_with = "lenient::amount")]
    pub total_chars: Option<f64>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub total_calls: Option<f64>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub total_duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub record_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub tts_chars: Option<f64>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub tts_calls: Option<f64>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub clone_chars: Option<f64>,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub clone_calls: Option<f64>,
}

impl UpstreamSummary {
    /// Usable only when `totalCalls` is a finite number
    pub fn is_usable(&self) -> bool {
        self.total_calls.is_some_and(f64::is_finite)
    }
}

/// Aggregate over one group (a day or an entity id)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendRow {
    pub key: String,
    pub tts_calls: u64,
    pub clone_calls: u64,
    pub tts_chars: u64,
    pub clone_chars: u64,
    pub duration_ms: u64,
    pub cost: f64,
}

impl TrendRow {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tts_calls: 0,
            clone_calls: 0,
            tts_chars: 0,
            clone_chars: 0,
            duration_ms: 0,
            cost: 0.0,
        }
    }

    pub fn add(&mut self, record: &UsageRecord) {
        match record.endpoint_kind {
            EndpointKind::Tts => {
                self.tts_calls = self.tts_calls.saturating_add(record.cost_calls);
                self.tts_chars = self.tts_chars.saturating_add(record.cost_chars);
            }
            EndpointKind::Clone => {
                self.clone_calls = self.clone_calls.saturating_add(record.cost_calls);
                self.clone_chars = self.clone_chars.saturating_add(record.cost_chars);
            }
        }
        self.duration_ms = self.duration_ms.saturating_add(record.duration_ms);
        self.cost += record.cost();
    }

    pub fn total_calls(&self) -> u64 {
        self.tts_calls.saturating_add(self.clone_calls)
    }

    pub fn total_chars(&self) -> u64 {
        self.tts_chars.saturating_add(self.clone_chars)
    }
}

/// Duration and cost split by endpoint kind, always derived from records
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct KindBreakdown {
    pub tts_duration_ms: u64,
    pub clone_duration_ms: u64,
    pub tts_cost: f64,
    pub clone_cost: f64,
}

impl KindBreakdown {
    pub fn add(&mut self, record: &UsageRecord) {
        match record.endpoint_kind {
            EndpointKind::Tts => {
                self.tts_duration_ms = self.tts_duration_ms.saturating_add(record.duration_ms);
                self.tts_cost += record.cost();
            }
            EndpointKind::Clone => {
                self.clone_duration_ms = self.clone_duration_ms.saturating_add(record.duration_ms);
                self.clone_cost += record.cost();
            }
        }
    }

    pub fn total_cost(&self) -> f64 {
        self.tts_cost + self.clone_cost
    }
}

/// Per-user totals, either from the backend or derived from records
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserUsage {
    pub user_id: i64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub total_chars: u64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub total_calls: u64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub clone_chars: u64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub clone_calls: u64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub tts_chars: u64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub tts_calls: u64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub record_count: u64,
}

impl UserUsage {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            total_chars: 0,
            total_calls: 0,
            clone_chars: 0,
            clone_calls: 0,
            tts_chars: 0,
            tts_calls: 0,
            record_count: 0,
        }
    }

    pub fn add(&mut self, record: &UsageRecord) {
        self.total_chars = self.total_chars.saturating_add(record.cost_chars);
        self.total_calls = self.total_calls.saturating_add(record.cost_calls);
        self.record_count = self.record_count.saturating_add(1);
        match record.endpoint_kind {
            EndpointKind::Tts => {
                self.tts_chars = self.tts_chars.saturating_add(record.cost_chars);
                self.tts_calls = self.tts_calls.saturating_add(record.cost_calls);
            }
            EndpointKind::Clone => {
                self.clone_chars = self.clone_chars.saturating_add(record.cost_chars);
                self.clone_calls = self.clone_calls.saturating_add(record.cost_calls);
            }
        }
    }
}
