//! End-to-end scans with the built-in HTTP client and spider

use async_trait::async_trait;
use std::time::Duration;
use sumi_audit::config::{Config, ReportEntry};
use sumi_audit::modules::{Issue, Module, ModuleContext, ModuleError, ModuleInfo, Severity, TimeoutCandidate};
use sumi_audit::storage::{SqliteStorage, Storage};
use sumi_audit::{AuditStore, Framework, Page, ScanStatus};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

/// Mounts `/`, `/page1` and `/page2`, all linking to each other
async fn three_page_site() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><title>Home</title></head><body>
            <a href="/page1">Page 1</a>
            <a href="/page2">Page 2</a>
            <a href="https://elsewhere.test/">Off site</a>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html(r#"<html><body><a href="/">Home</a></body></html>"#))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html(
            r#"<html><body><a href="/page1">Page 1</a></body></html>"#,
        ))
        .mount(&server)
        .await;

    server
}

fn target(server: &MockServer) -> String {
    format!("{}/", server.uri())
}

#[tokio::test]
async fn test_crawl_without_modules_only_builds_sitemap() {
    let server = three_page_site().await;
    let base = target(&server);

    let mut framework = Framework::new(Config::for_target(&base)).expect("framework");
    framework.run().await.expect("scan");

    assert_eq!(framework.status(), ScanStatus::Done);
    assert!(framework.auditmap().is_empty());
    assert_eq!(
        framework.sitemap(),
        vec![
            base.clone(),
            format!("{}page1", base),
            format!("{}page2", base)
        ]
    );

    let stats = framework.stats(false, false);
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.responses, 3);
    assert_eq!(stats.redirect_count, 0);
}

#[tokio::test]
async fn test_crawl_and_audit_every_page_once() {
    let server = three_page_site().await;
    let base = target(&server);

    let mut config = Config::for_target(&base);
    config.scan.modules = vec!["headers".to_string()];
    let mut framework = Framework::new(config).expect("framework");
    framework.run().await.expect("scan");

    let mut audited = framework.auditmap().to_vec();
    audited.sort();
    assert_eq!(audited, framework.sitemap());
    assert_eq!(framework.stats(false, false).progress, 100.0);
    assert!(framework.failures().is_empty());
}

#[tokio::test]
async fn test_unreachable_target_lands_in_failures() {
    let target = "http://127.0.0.1:9/";
    let mut config = Config::for_target(target);
    config.scan.modules = vec!["headers".to_string()];
    config.http.timeout_ms = 500;

    let mut framework = Framework::new(config).expect("framework");
    framework.run().await.expect("scan");

    assert_eq!(framework.failures(), vec![target]);
    assert!(framework.auditmap().is_empty());
    assert_eq!(framework.sitemap(), vec![target]);

    // One spider fetch plus the bounded audit attempts.
    let stats = framework.stats(false, false);
    assert_eq!(stats.requests, 6);
    assert_eq!(stats.responses, 0);
}

#[tokio::test]
async fn test_header_disclosure_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            html("<html><body>hi</body></html>")
                .insert_header("server", "Apache/2.4.41 (Ubuntu)")
                .insert_header("x-powered-by", "PHP/8.1.2"),
        )
        .mount(&server)
        .await;

    let mut config = Config::for_target(&target(&server));
    config.scan.modules = vec!["headers".to_string()];
    let mut framework = Framework::new(config).expect("framework");
    framework.run().await.expect("scan");

    let store = framework.audit_store();
    let names: Vec<&str> = store.issues.iter().map(|i| i.name.as_str()).collect();
    assert!(names.contains(&"Server version disclosure"), "{names:?}");
    assert!(names.contains(&"Framework disclosure"), "{names:?}");
    assert_eq!(store.issue_counts()[&Severity::Low], 1);
}

#[tokio::test]
async fn test_redirects_are_recorded_but_not_audited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/home"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(html("<html><body>home</body></html>"))
        .mount(&server)
        .await;

    let base = target(&server);
    let mut config = Config::for_target(&base);
    config.scan.modules = vec!["headers".to_string()];
    let mut framework = Framework::new(config).expect("framework");
    framework.run().await.expect("scan");

    assert_eq!(framework.sitemap(), vec![base.clone(), format!("{}home", base)]);
    assert_eq!(framework.auditmap(), &[format!("{}home", base)]);

    let stats = framework.stats(false, false);
    assert_eq!(stats.redirect_count, 1);
    assert_eq!(stats.progress, 100.0);
}

/// Queues a follow-up request per page and reports what came back
struct ProbeModule;

#[async_trait]
impl Module for ProbeModule {
    fn info(&self) -> ModuleInfo {
        ModuleInfo {
            name: "probe".to_string(),
            description: "requests /probe relative to each page".to_string(),
            priority: 50,
        }
    }

    async fn run(&self, page: &Page, ctx: &ModuleContext) -> Result<(), ModuleError> {
        let probe = page
            .url()
            .join("/probe")
            .map_err(|e| ModuleError::Failed(e.to_string()))?;
        let reporter = ctx.clone();
        let origin = page.url().clone();
        ctx.http().queue(
            probe,
            Box::new(move |response: Page| {
                if response.code() == 200 {
                    reporter.register_issue(Issue::new(
                        "Probe reachable",
                        "probe",
                        &origin,
                        Severity::Medium,
                        "the probe endpoint answered",
                    ));
                }
            }),
        );
        Ok(())
    }
}

#[tokio::test]
async fn test_queued_module_requests_complete_before_next_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html><body>root</body></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/probe"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut framework = Framework::new(Config::for_target(&target(&server))).expect("framework");
    framework
        .modules_mut()
        .register(std::sync::Arc::new(ProbeModule));
    framework.run().await.expect("scan");

    let issues = framework.audit_store().issues;
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].name, "Probe reachable");
    assert_eq!(issues[0].url, target(&server));
}

/// Flags `/slow` as a time-based injection candidate
struct SleepModule;

#[async_trait]
impl Module for SleepModule {
    fn info(&self) -> ModuleInfo {
        ModuleInfo {
            name: "sleep".to_string(),
            description: "schedules a timing probe".to_string(),
            priority: 50,
        }
    }

    async fn run(&self, page: &Page, ctx: &ModuleContext) -> Result<(), ModuleError> {
        if page.url().path() != "/" {
            return Ok(());
        }
        let join = |p: &str| {
            page.url()
                .join(p)
                .map_err(|e| ModuleError::Failed(e.to_string()))
        };
        let probe = join("/slow")?;
        ctx.add_timeout_candidate(TimeoutCandidate {
            module: "sleep".to_string(),
            issue: Issue::new(
                "Time-based injection",
                "sleep",
                &probe,
                Severity::High,
                "the delaying payload slowed the response",
            ),
            url: probe,
            control: join("/")?,
            delay: Duration::from_millis(400),
        });
        Ok(())
    }
}

#[tokio::test]
async fn test_timing_candidates_are_verified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html><body>root</body></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(700)))
        .mount(&server)
        .await;

    let mut config = Config::for_target(&target(&server));
    config.scan.only_positives = true;
    let mut framework = Framework::new(config).expect("framework");
    framework
        .modules_mut()
        .register(std::sync::Arc::new(SleepModule));
    framework.run().await.expect("scan");

    let issues = framework.audit_store().issues;
    assert_eq!(issues.len(), 1);
    assert!(issues[0].verified);
    assert_eq!(issues[0].remarks.len(), 1);
}

#[tokio::test]
async fn test_configured_reports_are_written() {
    let server = three_page_site().await;
    let dir = TempDir::new().unwrap();
    let json_path = dir.path().join("scan.json");
    let md_path = dir.path().join("scan.md");
    let db_path = dir.path().join("scan.db");

    let mut config = Config::for_target(&target(&server));
    config.scan.modules = vec!["headers".to_string()];
    config.reports = vec![
        ReportEntry {
            name: "json".to_string(),
            outfile: Some(json_path.display().to_string()),
        },
        ReportEntry {
            name: "markdown".to_string(),
            outfile: Some(md_path.display().to_string()),
        },
        ReportEntry {
            name: "sqlite".to_string(),
            outfile: Some(db_path.display().to_string()),
        },
        ReportEntry {
            name: "no-such-report".to_string(),
            outfile: None,
        },
    ];

    let mut framework = Framework::new(config).expect("framework");
    framework.set_config_hash("abc123");
    framework.run().await.expect("scan");

    let written: AuditStore =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(written.sitemap.len(), 3);
    assert_eq!(written.config_hash, "abc123");
    assert!(written.finish_datetime.is_some());

    let markdown = std::fs::read_to_string(&md_path).unwrap();
    assert!(markdown.starts_with("# Sumi-Audit Scan Report"));

    let storage = SqliteStorage::new(&db_path).unwrap();
    let latest = storage.get_latest_audit().unwrap().unwrap();
    assert_eq!(storage.load_sitemap(latest.id).unwrap(), written.sitemap);
    assert_eq!(latest.config_hash, "abc123");
}
