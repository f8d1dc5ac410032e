//! Report lookup and execution

use crate::config::ReportEntry;
use crate::output::json::JsonReport;
use crate::output::markdown::MarkdownReport;
use crate::output::sqlite_output::SqliteReport;
use crate::output::traits::{Report, ReportError, ReportInfo, ReportOptions, ReportResult};
use crate::output::AuditStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Known report formats, looked up by name
pub struct ReportManager {
    reports: Vec<Arc<dyn Report>>,
}

impl Default for ReportManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportManager {
    /// A manager with every built-in format available
    pub fn new() -> Self {
        Self {
            reports: vec![
                Arc::new(MarkdownReport),
                Arc::new(JsonReport),
                Arc::new(SqliteReport),
            ],
        }
    }

    /// Makes an additional format available; replaces one with the same name
    pub fn register(&mut self, report: Arc<dyn Report>) {
        let name = report.info().name;
        self.reports.retain(|r| r.info().name != name);
        self.reports.push(report);
    }

    pub fn get(&self, name: &str) -> ReportResult<Arc<dyn Report>> {
        self.reports
            .iter()
            .find(|r| r.info().name == name)
            .cloned()
            .ok_or_else(|| ReportError::NotFound(name.to_string()))
    }

    pub fn list(&self) -> Vec<ReportInfo> {
        self.reports.iter().map(|r| r.info()).collect()
    }

    /// Generates one report
    pub fn run_one(
        &self,
        name: &str,
        store: &AuditStore,
        options: &ReportOptions,
    ) -> ReportResult<()> {
        self.get(name)?.generate(store, options)
    }

    /// Generates every configured report
    ///
    /// Failures are logged and do not stop the remaining reports. Returns the
    /// files written.
    pub fn run(&self, store: &AuditStore, entries: &[ReportEntry]) -> Vec<PathBuf> {
        let mut written = Vec::new();
        for entry in entries {
            let outfile = match self.get(&entry.name) {
                Ok(report) => entry
                    .outfile
                    .as_ref()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| default_outfile(&report.info())),
                Err(e) => {
                    tracing::error!("Skipping report: {}", e);
                    continue;
                }
            };

            let options = ReportOptions { outfile };
            match self.run_one(&entry.name, store, &options) {
                Ok(()) => {
                    tracing::info!(
                        "Wrote {} report to {}",
                        entry.name,
                        options.outfile.display()
                    );
                    written.push(options.outfile);
                }
                Err(e) => tracing::error!("Report {} failed: {}", entry.name, e),
            }
        }
        written
    }

    /// Renders a string-capable report and returns its bytes
    pub fn report_as(&self, name: &str, store: &AuditStore) -> ReportResult<Vec<u8>> {
        let report = self.get(name)?;
        if !report.info().string_capable {
            return Err(ReportError::UnsupportedFormat(name.to_string()));
        }

        let sink = tempfile::NamedTempFile::new()?;
        let options = ReportOptions {
            outfile: sink.path().to_path_buf(),
        };
        report.generate(store, &options)?;
        Ok(std::fs::read(sink.path())?)
    }
}

fn default_outfile(info: &ReportInfo) -> PathBuf {
    PathBuf::from(format!(
        "{}-audit.{}",
        chrono::Utc::now().format("%Y%m%d-%H%M%S"),
        info.extension
    ))
}
