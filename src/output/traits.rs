//! Report trait and associated types
//!
//! A report renders an [`AuditStore`] into a file. Reports that produce text
//! can also be rendered to bytes through a temporary sink.

use crate::output::AuditStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while generating reports
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report not found: {0}")]
    NotFound(String),

    #[error("Report {0} cannot be rendered to a string")]
    UnsupportedFormat(String),

    #[error("Failed to format report: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Descriptive metadata for a report format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportInfo {
    pub name: String,
    pub description: String,
    /// File extension of the generated output
    pub extension: String,
    /// Whether the output is text that can be returned by `report_as`
    pub string_capable: bool,
}

/// Where and how to write a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub outfile: PathBuf,
}

/// A report format
pub trait Report: Send + Sync {
    fn info(&self) -> ReportInfo;

    /// Writes the report for `store` to `options.outfile`
    fn generate(&self, store: &AuditStore, options: &ReportOptions) -> ReportResult<()>;
}
