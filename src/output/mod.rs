//! Output module: scan results and the reports built from them
//!
//! This module handles:
//! - The end-of-scan `AuditStore` snapshot
//! - Progress and statistics calculation
//! - Report formats (markdown, JSON, SQLite) and their lookup

mod audit_store;
mod json;
mod manager;
mod markdown;
mod sqlite_output;
pub mod stats;
mod traits;

pub use audit_store::{AuditStore, REVISION};
pub use json::JsonReport;
pub use manager::ReportManager;
pub use markdown::{format_markdown_report, MarkdownReport};
pub use sqlite_output::SqliteReport;
pub use stats::{ScanClock, Stats, StatsInputs};
pub use traits::{Report, ReportError, ReportInfo, ReportOptions, ReportResult};
