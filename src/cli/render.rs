//! Plain-text and JSON rendering for the reporting subcommands

use serde::Serialize;
use serde_json::json;

use crate::services::UsageReport;
use crate::types::{Result, TrendRow, UserUsage, VoxmeterError};

/// Format a number with thousand separators (e.g., 1234567 -> "1,234,567")
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let len = s.len();
    let mut result = String::with_capacity(len + len / 3);

    for (i, ch) in s.bytes().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(ch as char);
    }

    result
}

/// Cost with trailing zeros trimmed (0.5 -> "0.5", 2 -> "2")
pub fn format_cost(cost: f64) -> String {
    let s = format!("{:.4}", cost);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| VoxmeterError::Parse(e.to_string()))
}

pub fn summary(report: &UsageReport, json: bool) -> Result<String> {
    let source = report.summary_source();
    let stats = source.stats();
    let breakdown = report.breakdown();

    if json {
        let origin = if source.is_trusted() {
            "backend"
        } else {
            "records"
        };
        return to_json(&json!({
            "source": origin,
            "summary": stats,
            "breakdown": breakdown,
            "totalCost": breakdown.total_cost(),
        }));
    }

    let origin = if source.is_trusted() {
        "backend statistics".to_string()
    } else {
        let count = report.records().len();
        format!("{} {}", count, if count == 1 { "record" } else { "records" })
    };

    let mut out = format!("Usage summary (from {})\n", origin);
    out.push_str(&format!(
        "  {:<16}{:>14}\n",
        "Total calls",
        format_number(stats.total_calls)
    ));
    out.push_str(&format!(
        "  {:<16}{:>14}\n",
        "Total chars",
        format_number(stats.total_chars)
    ));
    out.push_str(&format!(
        "  {:<16}{:>14}\n",
        "Duration (ms)",
        format_number(stats.total_duration)
    ));
    out.push_str(&format!(
        "  {:<16}{:>14}\n",
        "Records",
        format_number(stats.record_count)
    ));
    out.push('\n');
    out.push_str(&format!(
        "  {:<8}{:>12}{:>14}{:>16}{:>12}\n",
        "Kind", "Calls", "Chars", "Duration (ms)", "Cost"
    ));
    out.push_str(&format!(
        "  {:<8}{:>12}{:>14}{:>16}{:>12}\n",
        "tts",
        format_number(stats.tts_calls),
        format_number(stats.tts_chars),
        format_number(breakdown.tts_duration_ms),
        format_cost(breakdown.tts_cost)
    ));
    out.push_str(&format!(
        "  {:<8}{:>12}{:>14}{:>16}{:>12}",
        "clone",
        format_number(stats.clone_calls),
        format_number(stats.clone_chars),
        format_number(breakdown.clone_duration_ms),
        format_cost(breakdown.clone_cost)
    ));
    Ok(out)
}

pub fn trend(rows: &[TrendRow], json: bool) -> Result<String> {
    if json {
        return to_json(rows);
    }
    if rows.is_empty() {
        return Ok("No usage in this period".to_string());
    }

    let key_width = rows
        .iter()
        .map(|r| r.key.chars().count())
        .max()
        .unwrap_or(0)
        .max(10);

    let mut lines = vec![format!(
        "{:<kw$}{:>10}{:>10}{:>12}{:>12}{:>14}{:>10}",
        "Key",
        "TTS",
        "Clone",
        "TTS chars",
        "Clone chars",
        "Duration",
        "Cost",
        kw = key_width + 2
    )];
    for row in rows {
        lines.push(format!(
            "{:<kw$}{:>10}{:>10}{:>12}{:>12}{:>14}{:>10}",
            row.key,
            format_number(row.tts_calls),
            format_number(row.clone_calls),
            format_number(row.tts_chars),
            format_number(row.clone_chars),
            format_number(row.duration_ms),
            format_cost(row.cost),
            kw = key_width + 2
        ));
    }
    Ok(lines.join("\n"))
}

pub fn users(users: &[UserUsage], json: bool) -> Result<String> {
    if json {
        return to_json(users);
    }
    if users.is_empty() {
        return Ok("No per-user usage in this period".to_string());
    }

    let mut lines = vec![format!(
        "{:<10}{:>12}{:>14}{:>10}{:>10}{:>10}",
        "User", "Calls", "Chars", "TTS", "Clone", "Records"
    )];
    lines.extend(users.iter().map(|u| {
        format!(
            "{:<10}{:>12}{:>14}{:>10}{:>10}{:>10}",
            u.user_id,
            format_number(u.total_calls),
            format_number(u.total_chars),
            format_number(u.tts_calls),
            format_number(u.clone_calls),
            format_number(u.record_count)
        )
    }));
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Scope;
    use crate::types::{EndpointKind, UsageRecord};
    use chrono::{TimeZone, Utc};

    fn report() -> UsageReport {
        let record = UsageRecord {
            owner_user_id: Some(3),
            cost_chars: 1200,
            cost_calls: 2,
            duration_ms: 450,
            cost_amount: Some(0.25),
            ..UsageRecord::new(
                EndpointKind::Tts,
                Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            )
        };
        UsageReport::new(Scope::Mine, vec![record])
    }

    // ========== format helpers ==========

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(0.0), "0");
        assert_eq!(format_cost(0.5), "0.5");
        assert_eq!(format_cost(2.0), "2");
        assert_eq!(format_cost(1.23456), "1.2346");
    }

    // ========== views ==========

    #[test]
    fn test_summary_text() {
        let text = summary(&report(), false).unwrap();
        assert!(text.starts_with("Usage summary (from 1 record)\n"));
        assert!(text.contains("1,200"));
        assert!(text.contains("0.25"));
    }

    #[test]
    fn test_summary_text_pluralises_records() {
        let empty = UsageReport::new(Scope::Mine, Vec::new());
        let text = summary(&empty, false).unwrap();
        assert!(text.starts_with("Usage summary (from 0 records)\n"));

        let mut records = report().records().to_vec();
        records.push(records[0].clone());
        let text = summary(&UsageReport::new(Scope::Mine, records), false).unwrap();
        assert!(text.starts_with("Usage summary (from 2 records)\n"));
    }

    #[test]
    fn test_summary_json() {
        let text = summary(&report(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["source"], "records");
        assert_eq!(value["summary"]["ttsCalls"], 2);
        assert_eq!(value["breakdown"]["ttsDurationMs"], 450);
    }

    #[test]
    fn test_trend_empty() {
        assert_eq!(trend(&[], false).unwrap(), "No usage in this period");
        assert_eq!(trend(&[], true).unwrap(), "[]");
    }

    #[test]
    fn test_trend_text_rows() {
        let mut row = TrendRow::new("2024-01-01");
        row.tts_calls = 1500;
        let text = trend(&[row], false).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("2024-01-01"));
        assert!(lines[1].contains("1,500"));
    }

    #[test]
    fn test_users_json() {
        let users = report().users();
        let text = super::users(&users, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["userId"], 3);
        assert_eq!(value[0]["totalChars"], 1200);
    }
}
