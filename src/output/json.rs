//! JSON report: the audit store serialized as-is

use crate::output::traits::{Report, ReportError, ReportInfo, ReportOptions, ReportResult};
use crate::output::AuditStore;
use std::fs::File;
use std::io::{BufWriter, Write};

pub struct JsonReport;

impl Report for JsonReport {
    fn info(&self) -> ReportInfo {
        ReportInfo {
            name: "json".to_string(),
            description: "Complete audit store as pretty-printed JSON".to_string(),
            extension: "json".to_string(),
            string_capable: true,
        }
    }

    fn generate(&self, store: &AuditStore, options: &ReportOptions) -> ReportResult<()> {
        let mut writer = BufWriter::new(File::create(&options.outfile)?);
        serde_json::to_writer_pretty(&mut writer, store)
            .map_err(|e| ReportError::Format(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }
}
