//! Markdown report generation
//!
//! This module generates human-readable markdown reports of scan results,
//! including run metadata, an issue breakdown, the sitemap and failures.

use crate::output::traits::{Report, ReportInfo, ReportOptions, ReportResult};
use crate::output::AuditStore;
use crate::output::stats::format_hms;
use std::fs::File;
use std::io::Write;
use std::time::Duration;

/// Sitemap entries listed before the remainder is summarized
const SITEMAP_LIMIT: usize = 50;

/// Markdown report format
pub struct MarkdownReport;

impl Report for MarkdownReport {
    fn info(&self) -> ReportInfo {
        ReportInfo {
            name: "markdown".to_string(),
            description: "Human-readable markdown summary".to_string(),
            extension: "md".to_string(),
            string_capable: true,
        }
    }

    fn generate(&self, store: &AuditStore, options: &ReportOptions) -> ReportResult<()> {
        let markdown = format_markdown_report(store);

        let mut file = File::create(&options.outfile)?;
        file.write_all(markdown.as_bytes())?;

        Ok(())
    }
}

/// Formats an audit store as markdown
pub fn format_markdown_report(store: &AuditStore) -> String {
    let mut md = String::new();

    md.push_str("# Sumi-Audit Scan Report\n\n");

    // Run metadata
    md.push_str("## Scan Information\n\n");
    md.push_str(&format!("- **Target**: {}\n", store.target()));
    md.push_str(&format!(
        "- **Version**: {} ({})\n",
        store.version, store.revision
    ));
    if let Some(started) = &store.start_datetime {
        md.push_str(&format!("- **Started**: {}\n", started.to_rfc3339()));
    }
    if let Some(finished) = &store.finish_datetime {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    md.push_str(&format!(
        "- **Duration**: {}\n",
        format_hms(Duration::from_secs_f64(store.delta_time_secs.max(0.0)))
    ));
    md.push_str(&format!("- **Config Hash**: {}\n\n", store.config_hash));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Pages Discovered**: {}\n", store.sitemap.len()));
    md.push_str(&format!("- **Issues**: {}\n", store.issues.len()));
    md.push_str(&format!("- **Failed URLs**: {}\n\n", store.failures.len()));

    md.push_str("## Issues by Severity\n\n");
    md.push_str("| Severity | Count |\n");
    md.push_str("|----------|-------|\n");
    for (severity, count) in store.issue_counts() {
        md.push_str(&format!("| {} | {} |\n", severity, count));
    }
    md.push('\n');

    if !store.issues.is_empty() {
        md.push_str("## Issues\n\n");
        for issue in store.issues_by_severity() {
            md.push_str(&format!("### {} ({})\n\n", issue.name, issue.severity));
            md.push_str(&format!("- **URL**: {}\n", issue.url));
            md.push_str(&format!("- **Module**: {}\n", issue.module));
            md.push_str(&format!(
                "- **Verified**: {}\n",
                if issue.verified { "yes" } else { "no" }
            ));
            if !issue.description.is_empty() {
                md.push_str(&format!("\n{}\n", issue.description));
            }
            if !issue.remarks.is_empty() {
                md.push('\n');
                for remark in &issue.remarks {
                    md.push_str(&format!("> {}\n", remark));
                }
            }
            md.push('\n');
        }
    }

    if !store.sitemap.is_empty() {
        md.push_str("## Sitemap\n\n");
        for url in store.sitemap.iter().take(SITEMAP_LIMIT) {
            md.push_str(&format!("- {}\n", url));
        }
        if store.sitemap.len() > SITEMAP_LIMIT {
            md.push_str(&format!(
                "\n... and {} more\n\n",
                store.sitemap.len() - SITEMAP_LIMIT
            ));
        } else {
            md.push('\n');
        }
    }

    if !store.failures.is_empty() {
        md.push_str("## Unreachable URLs\n\n");
        for url in &store.failures {
            md.push_str(&format!("- {}\n", url));
        }
        md.push('\n');
    }

    if !store.plugins.is_empty() {
        md.push_str("## Plugins\n\n");
        for result in store.plugins.values() {
            md.push_str(&format!(
                "- **{}**: `{}`\n",
                result.name, result.results
            ));
        }
        md.push('\n');
    }

    md
}
