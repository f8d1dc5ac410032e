//! Report lookup and rendering through the framework

use crate::common::{offline_framework, restricted_config, Recorder, ScriptedFetcher};
use std::sync::Arc;
use sumi_audit::output::{ReportError, ReportInfo, ReportOptions, ReportResult, Report};
use sumi_audit::AuditStore;

#[tokio::test]
async fn test_report_as_renders_string_capable_formats() {
    let mut framework = offline_framework(
        restricted_config("http://app.test/", &["/a"]),
        Arc::new(ScriptedFetcher::default()),
    );
    framework
        .modules_mut()
        .register(Arc::new(Recorder::new("recorder", 10)));
    framework.run().await.unwrap();
    let store = framework.audit_store();

    let markdown = String::from_utf8(framework.report_as("markdown", &store).unwrap()).unwrap();
    assert!(markdown.contains("# Sumi-Audit Scan Report"));
    assert!(markdown.contains("http://app.test/a"));

    let json = framework.report_as("json", &store).unwrap();
    let parsed: AuditStore = serde_json::from_slice(&json).unwrap();
    assert_eq!(parsed.sitemap, store.sitemap);
    assert_eq!(parsed.issues, store.issues);
    assert_eq!(parsed.options, store.options);
}

#[test]
fn test_report_as_errors() {
    let framework = offline_framework(
        restricted_config("http://app.test/", &[]),
        Arc::new(ScriptedFetcher::default()),
    );
    let store = framework.audit_store();

    assert!(matches!(
        framework.report_as("pdf", &store),
        Err(ReportError::NotFound(name)) if name == "pdf"
    ));
    assert!(matches!(
        framework.report_as("sqlite", &store),
        Err(ReportError::UnsupportedFormat(name)) if name == "sqlite"
    ));
}

/// Plain-text list of the sitemap
struct SitemapReport;

impl Report for SitemapReport {
    fn info(&self) -> ReportInfo {
        ReportInfo {
            name: "sitemap".to_string(),
            description: "One URL per line".to_string(),
            extension: "txt".to_string(),
            string_capable: true,
        }
    }

    fn generate(&self, store: &AuditStore, options: &ReportOptions) -> ReportResult<()> {
        std::fs::write(&options.outfile, store.sitemap.join("\n"))?;
        Ok(())
    }
}

#[test]
fn test_custom_report_is_listed_and_rendered() {
    let mut framework = offline_framework(
        restricted_config("http://app.test/", &[]),
        Arc::new(ScriptedFetcher::default()),
    );
    framework.reports_mut().register(Arc::new(SitemapReport));
    assert!(framework.push_to_url_queue("/x"));
    assert!(framework.push_to_url_queue("/y"));

    let names: Vec<String> = framework.list_reports().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["markdown", "json", "sqlite", "sitemap"]);

    let store = framework.audit_store();
    let output = framework.report_as("sitemap", &store).unwrap();
    assert_eq!(output, b"http://app.test/x\nhttp://app.test/y");
}

#[test]
fn test_listings() {
    let framework = offline_framework(
        restricted_config("http://app.test/", &[]),
        Arc::new(ScriptedFetcher::default()),
    );

    assert!(framework.list_modules().is_empty());
    assert!(framework.list_plugins().is_empty());
    assert!(!framework.list_platforms().is_empty());
}
