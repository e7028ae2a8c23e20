mod render;

use chrono::{FixedOffset, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::services::{
    FileEmitter, GroupMode, ReportPeriod, ReportService, Scope, UsageQuery, UsageReport,
};
use crate::sources;
use crate::types::{EndpointKind, EntityKey, Result};

/// Usage statistics and CSV reports for TTS and voice-clone billing
#[derive(Parser)]
#[command(name = "voxmeter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.voxmeter/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show usage totals with the per-kind breakdown
    Summary {
        #[command(flatten)]
        query: QueryArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show usage grouped by day or by entity
    Trend {
        #[command(flatten)]
        query: QueryArgs,

        /// Grouping key
        #[arg(long, value_enum, default_value_t = TrendBy::Day)]
        by: TrendBy,

        /// Keep only groups whose key contains this text (entity grouping only)
        #[arg(long)]
        filter: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show per-user totals
    Users {
        #[command(flatten)]
        query: QueryArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export usage details as CSV
    Export {
        #[command(flatten)]
        query: QueryArgs,

        /// Output directory (default: export.output_dir)
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// File name (default depends on scope)
        #[arg(long)]
        filename: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TrendBy {
    Day,
    User,
    Agent,
    Slot,
}

impl TrendBy {
    fn mode(self) -> GroupMode {
        match self {
            TrendBy::Day => GroupMode::Day,
            TrendBy::User => GroupMode::ByField(EntityKey::UserId),
            TrendBy::Agent => GroupMode::ByField(EntityKey::AgentId),
            TrendBy::Slot => GroupMode::ByField(EntityKey::SlotId),
        }
    }
}

fn parse_endpoint(raw: &str) -> std::result::Result<EndpointKind, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "tts" => Ok(EndpointKind::Tts),
        "clone" => Ok(EndpointKind::Clone),
        other => Err(format!("expected `tts` or `clone`, got `{}`", other)),
    }
}

/// Source and window options shared by every subcommand
#[derive(Args, Debug, Clone)]
struct QueryArgs {
    /// Read records from local JSON/JSONL files matching this glob
    #[arg(long, value_name = "GLOB")]
    records: Option<String>,

    /// Console backend base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token for the console backend
    #[arg(long)]
    token: Option<String>,

    /// Query every user's records (administrative scope)
    #[arg(long)]
    admin: bool,

    /// Narrow an administrative query to one user
    #[arg(long, requires = "admin")]
    user_id: Option<i64>,

    /// Only records of this kind (tts or clone)
    #[arg(long, value_parser = parse_endpoint)]
    endpoint: Option<EndpointKind>,

    /// Reporting period: today, week, month or custom
    #[arg(long, default_value = "month")]
    period: ReportPeriod,

    /// Custom period start (YYYY-MM-DD or date-time)
    #[arg(long)]
    start: Option<String>,

    /// Custom period end (YYYY-MM-DD or date-time)
    #[arg(long)]
    end: Option<String>,

    /// Maximum number of detail records (default: report.limit)
    #[arg(long)]
    limit: Option<usize>,

    /// Offset for day buckets and CSV timestamps, e.g. +08:00
    #[arg(long, allow_hyphen_values = true)]
    utc_offset: Option<String>,
}

impl QueryArgs {
    /// Command-line values win over file and environment settings
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(records) = &self.records {
            config.source.records = Some(records.clone());
        }
        if let Some(base_url) = &self.base_url {
            config.source.base_url = Some(base_url.clone());
        }
        if let Some(token) = &self.token {
            config.source.token = Some(token.clone());
        }
        if let Some(offset) = &self.utc_offset {
            config.report.utc_offset = offset.clone();
        }
        if let Some(limit) = self.limit {
            config.report.limit = limit;
        }
    }

    fn scope(&self) -> Scope {
        if self.admin {
            Scope::Admin {
                user_id: self.user_id,
            }
        } else {
            Scope::Mine
        }
    }

    fn to_query(&self, config: &AppConfig, offset: FixedOffset) -> UsageQuery {
        if self.period == ReportPeriod::Custom && (self.start.is_none() || self.end.is_none()) {
            tracing::warn!("custom period needs both --start and --end, using the last 30 days");
        }

        let today = Utc::now().with_timezone(&offset).date_naive();
        let mut query = UsageQuery::new(self.scope());
        query.period = self.period;
        query.endpoint = self.endpoint;
        query.bounds = Some(
            self.period
                .resolve(today, self.start.as_deref(), self.end.as_deref()),
        );
        query.limit = Some(config.report.limit);
        query
    }
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let mut config = AppConfig::load(self.config.as_deref())?;

        match self.command {
            Commands::Summary { query, json } => {
                let report = load_report(&query, &mut config)?;
                println!("{}", render::summary(&report, json)?);
            }
            Commands::Trend {
                query,
                by,
                filter,
                json,
            } => {
                let report = load_report(&query, &mut config)?;
                let rows = report.trend(by.mode(), filter.as_deref());
                println!("{}", render::trend(&rows, json)?);
            }
            Commands::Users { query, json } => {
                let report = load_report(&query, &mut config)?;
                println!("{}", render::users(&report.users(), json)?);
            }
            Commands::Export {
                query,
                out_dir,
                filename,
            } => {
                let report = load_report(&query, &mut config)?;
                let dir = out_dir.unwrap_or_else(|| config.export.output_dir.clone());
                let mut emitter = FileEmitter::new(dir);
                let filename = filename.unwrap_or_else(|| report.scope().export_filename().to_string());
                report.export_as(&mut emitter, &filename)?;
                println!(
                    "Exported {} records to {}",
                    report.records().len(),
                    emitter.target_path(&filename)?.display()
                );
            }
        }
        Ok(())
    }
}

fn load_report(args: &QueryArgs, config: &mut AppConfig) -> Result<UsageReport> {
    args.apply_to(config);
    let offset = config.report.offset()?;
    let source = sources::from_config(&config.source, offset)?;
    let service = ReportService::new(source).with_offset(offset);

    let query = args.to_query(config, offset);
    service.load(&query)
}
