//! Scan lifecycle tests over in-memory collaborators

use crate::common::{
    offline_framework, restricted_config, tally, Failing, FailingSpider, IdleHttp, Panicky,
    Recorder, ScriptedFetcher,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_audit::audit::AUDIT_PAGE_MAX_TRIES;
use sumi_audit::audit::{Collaborators, NoSession};
use sumi_audit::config::{Config, RedundantRule, ReportEntry};
use sumi_audit::plugins::ProgressLog;
use sumi_audit::{AuditError, AuditStore, Framework, Page, ScanStatus};
use tempfile::TempDir;
use url::Url;

#[tokio::test]
async fn test_unreachable_url_is_fetched_max_tries_then_abandoned() {
    let down = "http://app.test/down";
    let fetcher = Arc::new(ScriptedFetcher::with_down(&[down]));
    let mut framework = offline_framework(
        restricted_config("http://app.test/", &["/down"]),
        fetcher.clone(),
    );
    let recorder = Recorder::new("recorder", 10);
    let seen = recorder.seen.clone();
    framework.modules_mut().register(Arc::new(recorder));

    framework.run().await.unwrap();

    assert_eq!(fetcher.calls_to(down), AUDIT_PAGE_MAX_TRIES as usize);
    assert_eq!(framework.failures(), vec![down]);
    assert!(framework.auditmap().is_empty());
    assert_eq!(framework.sitemap(), vec![down]);
    assert!(seen.lock().unwrap().is_empty());

    let store = framework.audit_store();
    assert_eq!(store.failures, vec![down]);
    assert_eq!(framework.stats(false, false).failures, 1);
}

#[tokio::test]
async fn test_healthy_urls_are_fetched_once() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mut framework = offline_framework(
        restricted_config("http://app.test/", &["/a", "/b", "/c"]),
        fetcher.clone(),
    );
    framework
        .modules_mut()
        .register(Arc::new(Recorder::new("recorder", 10)));

    framework.run().await.unwrap();

    let calls = fetcher.calls();
    assert!(tally(&calls).values().all(|&n| n == 1), "{calls:?}");
    assert_eq!(
        framework.auditmap(),
        &["http://app.test/a", "http://app.test/b", "http://app.test/c"]
    );
    assert!(framework.failures().is_empty());
}

#[tokio::test]
async fn test_observer_feedback_is_drained_to_a_fixed_point() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mut framework = offline_framework(
        restricted_config("http://app.test/", &["/p"]),
        fetcher,
    );
    framework
        .modules_mut()
        .register(Arc::new(Recorder::new("recorder", 10)));
    framework.on_audit_page(|page, queue| {
        if page.url().path() == "/p" {
            assert!(queue.push_url("/q"));
            let extra = Page::new(Url::parse("http://app.test/r").unwrap(), 200);
            assert!(queue.push_page(extra));
            assert!(!queue.push_url("http://elsewhere.test/"));
        }
    });

    framework.run().await.unwrap();

    let auditmap = framework.auditmap().to_vec();
    assert_eq!(auditmap.len(), 3, "{auditmap:?}");
    assert_eq!(auditmap[0], "http://app.test/p");
    assert!(auditmap.contains(&"http://app.test/q".to_string()));
    assert!(auditmap.contains(&"http://app.test/r".to_string()));
    // Pages pushed while auditing are drained before the next URL.
    assert_eq!(auditmap[1], "http://app.test/r");
    assert_eq!(framework.status(), ScanStatus::Done);
}

#[tokio::test]
async fn test_sitemap_is_monotonic_and_deduplicated() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mut config = Config::for_target("http://app.test/");
    config.scan.exclude = vec!["logout".to_string()];
    let mut framework = offline_framework(config, fetcher);

    let mut sizes = vec![framework.sitemap().len()];
    assert!(framework.push_to_url_queue("/a"));
    sizes.push(framework.sitemap().len());
    assert!(framework.push_to_url_queue("/a"));
    sizes.push(framework.sitemap().len());
    assert!(framework.push_to_url_queue("http://APP.test/a#frag"));
    sizes.push(framework.sitemap().len());
    assert!(framework.push_to_page_queue(Page::new(
        Url::parse("http://app.test/a").unwrap(),
        200
    )));
    sizes.push(framework.sitemap().len());
    assert!(!framework.push_to_url_queue("/logout"));
    sizes.push(framework.sitemap().len());
    assert!(framework.push_to_url_queue("/b"));
    sizes.push(framework.sitemap().len());

    assert!(sizes.windows(2).all(|w| w[1] >= w[0]), "{sizes:?}");
    assert_eq!(sizes, vec![0, 1, 1, 1, 1, 1, 2]);
    assert_eq!(
        framework.sitemap(),
        vec!["http://app.test/a", "http://app.test/b"]
    );
}

#[tokio::test]
async fn test_progress_stays_within_bounds() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mut framework = offline_framework(
        restricted_config("http://app.test/", &["/a", "/b"]),
        fetcher,
    );
    framework
        .modules_mut()
        .register(Arc::new(Recorder::new("recorder", 10)));

    let before = framework.stats(true, true);
    assert_eq!(before.progress, 0.0);
    assert_eq!(before.eta, None);

    framework.run().await.unwrap();

    let after = framework.stats(true, true);
    assert_eq!(after.progress, 100.0);
    assert_eq!(after.auditmap_size, 2);
    assert_eq!(after.sitemap_size, 2);
    assert_eq!(after.current_page, None);
    assert!(after.url_queue_total_size >= 2);
}

#[tokio::test]
async fn test_pause_holds_scan_until_every_holder_resumes() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mut framework = offline_framework(
        restricted_config("http://app.test/", &["/a"]),
        fetcher.clone(),
    );
    framework
        .modules_mut()
        .register(Arc::new(Recorder::new("recorder", 10)));
    let handle = framework.handle();

    assert!(handle.pause("ui"));
    assert!(handle.pause("plugin"));

    let observed = Arc::new(Mutex::new(Vec::new()));
    let controller = {
        let handle = handle.clone();
        let observed = observed.clone();
        let fetcher = fetcher.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            observed.lock().unwrap().push((handle.status(), fetcher.calls().len()));

            handle.resume("ui");
            tokio::time::sleep(Duration::from_millis(100)).await;
            observed.lock().unwrap().push((handle.status(), fetcher.calls().len()));

            handle.resume("plugin");
        }
    };

    let (result, _) = tokio::join!(framework.run(), controller);
    result.unwrap();

    let observed = observed.lock().unwrap().clone();
    assert_eq!(observed, vec![(ScanStatus::Paused, 0), (ScanStatus::Paused, 0)]);
    assert!(!handle.is_paused());
    assert_eq!(framework.status(), ScanStatus::Done);
    assert_eq!(framework.auditmap(), &["http://app.test/a"]);
}

#[tokio::test]
async fn test_audit_store_is_idempotent_and_keeps_pristine_options() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mut config = restricted_config(
        "http://app.test/",
        &["/calendar?d=1", "/calendar?d=2", "/about"],
    );
    config.redundant = vec![RedundantRule {
        pattern: "calendar".to_string(),
        count: 1,
    }];
    let mut framework = offline_framework(config.clone(), fetcher);
    framework
        .modules_mut()
        .register(Arc::new(Recorder::new("recorder", 10)));

    assert_eq!(framework.audit_store(), framework.audit_store());

    framework.run().await.unwrap();

    let first = framework.audit_store();
    let second = framework.audit_store();
    assert_eq!(first, second);
    assert_eq!(first.options, config);
    assert_eq!(first.options.redundant[0].count, 1);
    assert_eq!(
        first.sitemap,
        vec!["http://app.test/about", "http://app.test/calendar?d=1"]
    );
    assert_eq!(first.issues.len(), 2);
    assert!(first.start_datetime.is_some());
    assert!(first.finish_datetime.is_some());
}

#[tokio::test]
async fn test_module_faults_do_not_stop_the_scan() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mut framework = offline_framework(
        restricted_config("http://app.test/", &["/a", "/b"]),
        fetcher,
    );
    let recorder = Recorder::new("recorder", 10);
    let seen = recorder.seen.clone();
    framework.modules_mut().register(Arc::new(Panicky));
    framework.modules_mut().register(Arc::new(Failing));
    framework.modules_mut().register(Arc::new(recorder));

    framework.run().await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["http://app.test/a", "http://app.test/b"]
    );
    assert_eq!(framework.auditmap().len(), 2);
    assert_eq!(framework.status(), ScanStatus::Done);
}

#[tokio::test]
async fn test_only_positives_lifts_after_cleanup() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mut config = restricted_config("http://app.test/", &["/a"]);
    config.scan.only_positives = true;
    let mut framework = offline_framework(config, fetcher);
    framework
        .modules_mut()
        .register(Arc::new(Recorder::new("recorder", 10)));

    assert!(framework.audit_store().issues.is_empty());
    framework.run().await.unwrap();

    let store = framework.audit_store();
    assert_eq!(store.issues.len(), 1);
    assert!(!store.issues[0].verified);
}

#[tokio::test]
async fn test_run_requires_reset_between_scans() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mut framework = offline_framework(
        restricted_config("http://app.test/", &["/a"]),
        fetcher.clone(),
    );
    framework
        .modules_mut()
        .register(Arc::new(Recorder::new("recorder", 10)));

    framework.run().await.unwrap();
    assert!(matches!(
        framework.run().await,
        Err(AuditError::InvalidTransition {
            from: ScanStatus::Done,
            ..
        })
    ));

    framework.reset().unwrap();
    assert_eq!(framework.status(), ScanStatus::Ready);
    assert!(framework.auditmap().is_empty());
    assert!(framework.sitemap().is_empty());
    assert!(framework.audit_store().issues.is_empty());

    framework.run().await.unwrap();
    assert_eq!(framework.auditmap(), &["http://app.test/a"]);
    assert_eq!(fetcher.calls_to("http://app.test/a"), 2);
}

#[tokio::test]
async fn test_no_modules_skips_auditing() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mut framework = offline_framework(
        restricted_config("http://app.test/", &["/a", "/b"]),
        fetcher.clone(),
    );

    framework.run().await.unwrap();

    assert!(fetcher.calls().is_empty());
    assert!(framework.auditmap().is_empty());
    assert_eq!(framework.sitemap().len(), 2);
    assert_eq!(framework.status(), ScanStatus::Done);
}

#[tokio::test]
async fn test_plugin_results_land_in_audit_store() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mut framework = offline_framework(
        restricted_config("http://app.test/", &["/a"]),
        fetcher,
    );
    framework
        .modules_mut()
        .register(Arc::new(Recorder::new("recorder", 10)));
    framework
        .plugins_mut()
        .register(Arc::new(ProgressLog::new(Duration::from_millis(10))));

    framework.run().await.unwrap();

    assert!(!framework.handle().is_running());
    let store = framework.audit_store();
    let result = &store.plugins["progress_log"];
    assert_eq!(result.name, "progress_log");
    assert_eq!(result.results["final_progress"], 100.0);
}

#[tokio::test]
async fn test_url_and_page_pushes_share_identity() {
    let fetcher = Arc::new(ScriptedFetcher::default());
    let mut framework = offline_framework(Config::for_target("http://app.test/"), fetcher);

    assert!(framework.push_to_url_queue("http://app.test/a?b=2&a=1"));
    assert!(framework.push_to_page_queue(Page::new(
        Url::parse("http://app.test/a?b=2&a=1#frag").unwrap(),
        200
    )));
    assert!(framework.push_to_page_queue(Page::new(
        Url::parse("http://APP.test/a?a=1&b=2").unwrap(),
        200
    )));

    assert_eq!(framework.sitemap(), vec!["http://app.test/a?a=1&b=2"]);
    assert_eq!(framework.stats(false, false).sitemap_size, 1);
}

#[tokio::test]
async fn test_crawl_fault_still_cleans_up_and_reports() {
    let dir = TempDir::new().unwrap();
    let report_path = dir.path().join("partial.json");

    let mut config = Config::for_target("http://app.test/");
    config.reports = vec![ReportEntry {
        name: "json".to_string(),
        outfile: Some(report_path.display().to_string()),
    }];

    let mut framework = Framework::with_collaborators(
        config,
        Collaborators {
            spider: Arc::new(FailingSpider::new(&["http://app.test/a", "http://app.test/b"])),
            fetcher: Arc::new(ScriptedFetcher::default()),
            http: Arc::new(IdleHttp),
            session: Arc::new(NoSession),
        },
    )
    .unwrap();
    framework
        .modules_mut()
        .register(Arc::new(Recorder::new("recorder", 10)));

    framework.run().await.unwrap();

    assert_eq!(framework.status(), ScanStatus::Done);
    assert!(!framework.is_running());
    assert_eq!(
        framework.sitemap(),
        vec!["http://app.test/a", "http://app.test/b"]
    );

    let written: AuditStore =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(written.sitemap, framework.sitemap());
    assert!(written.finish_datetime.is_some());
}
