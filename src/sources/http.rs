//! Console backend over HTTP (`{code, msg, data}` JSON envelopes)

use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

use super::{decode_envelope, records_from_values, RecordSource};
use crate::services::window::{Scope, UsageQuery};
use crate::types::{Result, UpstreamSummary, UsageRecord, UserUsage, VoxmeterError};

const MINE_LIST_PATH: &str = "/tts/usage/mine";
const MINE_STATS_PATH: &str = "/tts/usage/mine/statistics";
const ADMIN_LIST_PATH: &str = "/tts/usage/admin/list";
const ADMIN_STATS_PATH: &str = "/tts/usage/admin/statistics";
const ADMIN_USER_STATS_PATH: &str = "/tts/usage/admin/statisticsByUser";

/// Fetches records and statistics from the console backend
pub struct HttpRecordSource {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpRecordSource {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoxmeterError::Source(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str, params: &[(&'static str, String)]) -> Result<String> {
        let url = self.url(path);
        tracing::debug!(%url, ?params, "requesting usage data");

        let mut request = self.client.get(&url).query(params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| VoxmeterError::Source(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoxmeterError::Source(format!(
                "{} returned HTTP {}",
                path, status
            )));
        }

        response
            .text()
            .map_err(|e| VoxmeterError::Source(format!("Failed to read response: {}", e)))
    }
}

/// Detail-list endpoint for the query's scope
pub fn list_path(scope: &Scope) -> &'static str {
    match scope {
        Scope::Mine => MINE_LIST_PATH,
        Scope::Admin { .. } => ADMIN_LIST_PATH,
    }
}

/// Summary endpoint for the query's scope
pub fn statistics_path(scope: &Scope) -> &'static str {
    match scope {
        Scope::Mine => MINE_STATS_PATH,
        Scope::Admin { .. } => ADMIN_STATS_PATH,
    }
}

fn push_user_and_window(query: &UsageQuery, params: &mut Vec<(&'static str, String)>) {
    if let Scope::Admin {
        user_id: Some(user_id),
    } = query.scope
    {
        params.push(("userId", user_id.to_string()));
    }
    if let Some(bounds) = &query.bounds {
        params.push(("start", bounds.start.clone()));
        params.push(("end", bounds.end.clone()));
    }
}

/// Query string for the detail list
pub fn list_params(query: &UsageQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(kind) = query.endpoint {
        params.push(("endpoint", kind.as_str().to_string()));
    }
    push_user_and_window(query, &mut params);
    if let Some(limit) = query.limit.filter(|l| *l > 0) {
        params.push(("limit", limit.to_string()));
    }
    params
}

/// Query string for the statistics endpoints
pub fn statistics_params(query: &UsageQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![("period", query.period.as_str().to_string())];
    push_user_and_window(query, &mut params);
    params
}

/// Summary payload: only a JSON object counts as a summary
pub fn decode_summary(body: &str) -> Result<Option<UpstreamSummary>> {
    match decode_envelope::<Value>(body)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| VoxmeterError::Parse(e.to_string())),
        _ => Ok(None),
    }
}

/// Per-user payload: entries without a numeric `userId` are skipped
pub fn decode_user_stats(body: &str) -> Result<Vec<UserUsage>> {
    let values = match decode_envelope::<Value>(body)? {
        Some(Value::Array(values)) => values,
        _ => return Ok(Vec::new()),
    };

    Ok(values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<UserUsage>(value) {
            Ok(usage) => Some(usage),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable per-user statistics entry");
                None
            }
        })
        .collect())
}

impl RecordSource for HttpRecordSource {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch_records(&self, query: &UsageQuery) -> Result<Vec<UsageRecord>> {
        let path = list_path(&query.scope);
        let body = self.get(path, &list_params(query))?;
        let values: Vec<Value> = decode_envelope(&body)?.unwrap_or_default();
        Ok(records_from_values(values, path))
    }

    fn fetch_summary(&self, query: &UsageQuery) -> Result<Option<UpstreamSummary>> {
        let body = self.get(statistics_path(&query.scope), &statistics_params(query))?;
        decode_summary(&body)
    }

    /// Only administrators can list other users' totals
    fn fetch_user_stats(&self, query: &UsageQuery) -> Result<Vec<UserUsage>> {
        if !query.scope.is_admin() {
            return Ok(Vec::new());
        }
        let body = self.get(ADMIN_USER_STATS_PATH, &statistics_params(query))?;
        decode_user_stats(&body)
    }
}
