//! Services for usage aggregation, grouping and export

pub mod aggregator;
pub mod csv_export;
pub mod download;
pub mod grouper;
pub mod report;
pub mod window;

pub use aggregator::{Aggregator, SummarySource};
pub use csv_export::{build_csv, CsvExporter};
pub use download::{download_csv, CsvEmitter, FileEmitter, MemoryEmitter};
pub use grouper::{GroupMode, Grouper};
pub use report::{ReportService, UsageReport};
pub use window::{ReportPeriod, ReportWindow, Scope, UsageQuery, WindowBounds};
