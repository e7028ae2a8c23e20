//! Application configuration: TOML file plus `VOXMETER_*` environment overrides

use chrono::FixedOffset;
use directories::BaseDirs;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{Result, VoxmeterError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl AppConfig {
    /// Explicit path, else `~/.voxmeter/config.toml` when present, else defaults.
    /// Environment overrides apply last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default_path) if default_path.exists() => Self::from_file(&default_path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            VoxmeterError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| VoxmeterError::Config(format!("Invalid configuration: {}", e)))
    }

    /// `~/.voxmeter/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.home_dir().join(".voxmeter").join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the process environment in practice)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("VOXMETER_BASE_URL") {
            self.source.base_url = Some(base_url);
        }
        if let Some(token) = lookup("VOXMETER_TOKEN") {
            self.source.token = Some(token);
        }
        if let Some(records) = lookup("VOXMETER_RECORDS") {
            self.source.records = Some(records);
        }
        if let Some(offset) = lookup("VOXMETER_UTC_OFFSET") {
            self.report.utc_offset = offset;
        }
        if let Some(dir) = lookup("VOXMETER_EXPORT_DIR") {
            self.export.output_dir = PathBuf::from(dir);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Console backend root, e.g. `http://localhost:8002/xiaozhi`
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    /// Glob of local record files; takes precedence over `base_url`
    #[serde(default)]
    pub records: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            records: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Offset for day bucketing and CSV timestamps, e.g. `+08:00`
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
            limit: default_limit(),
        }
    }
}

impl ReportConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

/// Parse `Z`, `UTC`, `+HH:MM`, `-HH:MM` or `+HHMM`
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let invalid = || VoxmeterError::Config(format!("Invalid UTC offset: {:?}", raw));
    let s = raw.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 && rest.is_ascii() => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

fn default_limit() -> usize {
    100
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
