//! Report windows and usage queries

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::str::FromStr;

use crate::types::{lenient, EndpointKind, Result, UsageRecord, VoxmeterError};

/// Named reporting period, resolved against a reference day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportPeriod {
    Today,
    /// Last 7 days including today
    Week,
    /// Last 30 days including today
    #[default]
    Month,
    /// Explicit start/end dates
    Custom,
}

impl ReportPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::Today => "today",
            ReportPeriod::Week => "week",
            ReportPeriod::Month => "month",
            ReportPeriod::Custom => "custom",
        }
    }

    /// Resolve to inclusive day bounds. A custom period missing either date
    /// falls back to the monthly window.
    pub fn resolve(&self, today: NaiveDate, start: Option<&str>, end: Option<&str>) -> WindowBounds {
        match (self, non_blank(start), non_blank(end)) {
            (ReportPeriod::Custom, Some(start), Some(end)) => WindowBounds {
                start: start.to_string(),
                end: end.to_string(),
            },
            (ReportPeriod::Today, _, _) => WindowBounds::days(today, today),
            (ReportPeriod::Week, _, _) => WindowBounds::days(today - chrono::Duration::days(6), today),
            _ => WindowBounds::days(today - chrono::Duration::days(29), today),
        }
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

impl FromStr for ReportPeriod {
    type Err = VoxmeterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(ReportPeriod::Today),
            "week" | "7d" => Ok(ReportPeriod::Week),
            "month" | "30d" => Ok(ReportPeriod::Month),
            "custom" => Ok(ReportPeriod::Custom),
            other => Err(VoxmeterError::Config(format!("Unknown period: {}", other))),
        }
    }
}

/// Start/end strings as the backend accepts them (`YYYY-MM-DD` or date-time)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowBounds {
    pub start: String,
    pub end: String,
}

impl WindowBounds {
    pub fn days(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start.format("%Y-%m-%d").to_string(),
            end: end.format("%Y-%m-%d").to_string(),
        }
    }

    /// Interpret the bounds at `offset`: bare dates cover the whole day
    pub fn to_window(&self, offset: &FixedOffset) -> Result<ReportWindow> {
        let start = parse_bound(&self.start, NaiveTime::MIN, offset)?;
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        let end = parse_bound(&self.end, end_of_day, offset)?;
        Ok(ReportWindow { start, end })
    }
}

fn parse_bound(raw: &str, day_time: NaiveTime, offset: &FixedOffset) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    let naive: NaiveDateTime = match lenient::parse_naive_datetime(raw) {
        Some(dt) => dt,
        None => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|d| d.and_time(day_time))
            .map_err(|_| VoxmeterError::Parse(format!("Invalid date bound: {}", raw)))?,
    };
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| VoxmeterError::Parse(format!("Invalid date bound: {}", raw)))
}

/// Inclusive time range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start && *ts <= self.end
    }
}

/// Whose records a query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The caller's own records
    Mine,
    /// Every user's records, optionally narrowed to one user
    Admin { user_id: Option<i64> },
}

impl Scope {
    pub fn is_admin(&self) -> bool {
        matches!(self, Scope::Admin { .. })
    }

    /// Download filename for a detail export in this scope
    pub fn export_filename(&self) -> &'static str {
        match self {
            Scope::Mine => "my-usage-details.csv",
            Scope::Admin { .. } => "usage-details.csv",
        }
    }
}

/// Filter handed to a record source
#[derive(Debug, Clone, PartialEq)]
pub struct UsageQuery {
    pub scope: Scope,
    pub period: ReportPeriod,
    pub endpoint: Option<EndpointKind>,
    pub bounds: Option<WindowBounds>,
    pub limit: Option<usize>,
}

impl UsageQuery {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            period: ReportPeriod::default(),
            endpoint: None,
            bounds: None,
            limit: None,
        }
    }

    /// Owner / endpoint / window check used by sources that filter locally
    pub fn matches(&self, record: &UsageRecord, window: Option<&ReportWindow>) -> bool {
        if let Scope::Admin { user_id: Some(user_id) } = self.scope {
            if record.owner_user_id != Some(user_id) {
                return false;
            }
        }
        if let Some(kind) = self.endpoint {
            if record.endpoint_kind != kind {
                return false;
            }
        }
        window.map_or(true, |w| w.contains(&record.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_resolve_named_periods() {
        let today = day(2024, 3, 31);

        assert_eq!(
            ReportPeriod::Today.resolve(today, None, None),
            WindowBounds::days(today, today)
        );
        assert_eq!(
            ReportPeriod::Week.resolve(today, None, None),
            WindowBounds::days(day(2024, 3, 25), today)
        );
        assert_eq!(
            ReportPeriod::Month.resolve(today, None, None),
            WindowBounds::days(day(2024, 3, 2), today)
        );
    }

    #[test]
    fn test_resolve_custom() {
        let today = day(2024, 3, 31);
        let bounds = ReportPeriod::Custom.resolve(today, Some("2024-01-01"), Some("2024-01-15"));
        assert_eq!(bounds.start, "2024-01-01");
        assert_eq!(bounds.end, "2024-01-15");

        // Incomplete custom range falls back to the monthly window
        let fallback = ReportPeriod::Custom.resolve(today, Some("2024-01-01"), Some(" "));
        assert_eq!(fallback, WindowBounds::days(day(2024, 3, 2), today));
    }

    #[test]
    fn test_period_from_str() {
        assert_eq!("Today".parse::<ReportPeriod>().unwrap(), ReportPeriod::Today);
        assert_eq!("7d".parse::<ReportPeriod>().unwrap(), ReportPeriod::Week);
        assert!("fortnight".parse::<ReportPeriod>().is_err());
    }

    #[test]
    fn test_window_covers_whole_days() {
        let bounds = WindowBounds::days(day(2024, 1, 1), day(2024, 1, 2));
        let window = bounds.to_window(&Utc.fix()).unwrap();

        assert!(window.contains(&Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert!(window.contains(&Utc.with_ymd_and_hms(2024, 1, 2, 23, 59, 59).unwrap()));
        assert!(!window.contains(&Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()));
        assert!(!window.contains(&Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()));
    }

    #[test]
    fn test_window_at_offset_and_datetime_bounds() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let bounds = WindowBounds {
            start: "2024-01-01 08:00".into(),
            end: "2024-01-01".into(),
        };
        let window = bounds.to_window(&offset).unwrap();

        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 1, 1, 15, 59, 59).unwrap());
    }

    #[test]
    fn test_window_rejects_garbage() {
        let bounds = WindowBounds {
            start: "soon".into(),
            end: "2024-01-01".into(),
        };
        assert!(bounds.to_window(&Utc.fix()).is_err());
    }

    #[test]
    fn test_query_matches() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut record = UsageRecord::new(EndpointKind::Tts, ts);
        record.owner_user_id = Some(3);

        let mut query = UsageQuery::new(Scope::Admin { user_id: Some(3) });
        assert!(query.matches(&record, None));

        query.endpoint = Some(EndpointKind::Clone);
        assert!(!query.matches(&record, None));

        let other_user = UsageQuery::new(Scope::Admin { user_id: Some(4) });
        assert!(!other_user.matches(&record, None));

        let window = WindowBounds::days(day(2024, 1, 2), day(2024, 1, 3))
            .to_window(&Utc.fix())
            .unwrap();
        assert!(!UsageQuery::new(Scope::Mine).matches(&record, Some(&window)));
    }

    #[test]
    fn test_scope_filenames() {
        assert_eq!(Scope::Mine.export_filename(), "my-usage-details.csv");
        assert!(!Scope::Mine.is_admin());
        let admin = Scope::Admin { user_id: None };
        assert_eq!(admin.export_filename(), "usage-details.csv");
        assert!(admin.is_admin());
    }
}
