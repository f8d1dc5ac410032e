//! SQLite report: persists the audit store into a database file
//!
//! Repeated runs against the same outfile append a new audit each time.

use crate::output::traits::{Report, ReportInfo, ReportOptions, ReportResult};
use crate::output::AuditStore;
use crate::storage::{SqliteStorage, Storage};

pub struct SqliteReport;

impl Report for SqliteReport {
    fn info(&self) -> ReportInfo {
        ReportInfo {
            name: "sqlite".to_string(),
            description: "Stores the audit in a SQLite database".to_string(),
            extension: "db".to_string(),
            string_capable: false,
        }
    }

    fn generate(&self, store: &AuditStore, options: &ReportOptions) -> ReportResult<()> {
        let mut storage = SqliteStorage::new(&options.outfile)?;
        let audit_id = storage.save_audit_store(store)?;
        tracing::debug!(
            "Saved audit {} to {}",
            audit_id,
            options.outfile.display()
        );
        Ok(())
    }
}
