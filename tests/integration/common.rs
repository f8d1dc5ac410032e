//! Shared collaborators and modules for integration tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use sumi_audit::audit::{
    Collaborators, Fetcher, HttpRunner, HttpStatistics, NoSession, NullSpider, ResponseCallback,
    Spider,
};
use sumi_audit::config::Config;
use sumi_audit::modules::{Issue, Module, ModuleContext, ModuleError, ModuleInfo, Severity};
use sumi_audit::{AuditError, Framework, Page};
use url::Url;

/// Answers every URL with an HTML page, except the ones marked down
#[derive(Default)]
pub struct ScriptedFetcher {
    down: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn with_down(urls: &[&str]) -> Self {
        Self {
            down: urls.iter().map(|u| u.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == url).count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url) -> Page {
        self.calls.lock().unwrap().push(url.to_string());
        if self.down.contains(url.as_str()) {
            return Page::no_response(url.clone());
        }
        Page::new(url.clone(), 200)
            .with_headers([("content-type", "text/html")])
            .with_body("<html><body>ok</body></html>")
    }
}

/// HTTP runner that never sends anything
pub struct IdleHttp;

#[async_trait]
impl HttpRunner for IdleHttp {
    fn queue(&self, _url: Url, _callback: ResponseCallback) {}

    async fn run(&self) {}

    fn statistics(&self) -> HttpStatistics {
        HttpStatistics::default()
    }

    fn reset(&self) {}
}

/// Framework over a scripted fetcher and no spider
pub fn offline_framework(config: Config, fetcher: Arc<ScriptedFetcher>) -> Framework {
    Framework::with_collaborators(
        config,
        Collaborators {
            spider: Arc::new(NullSpider),
            fetcher,
            http: Arc::new(IdleHttp),
            session: Arc::new(NoSession),
        },
    )
    .expect("framework")
}

/// Hands over its pages, then fails mid-crawl
pub struct FailingSpider {
    pages: Vec<String>,
}

impl FailingSpider {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[async_trait]
impl Spider for FailingSpider {
    async fn run(
        &self,
        on_page: &mut (dyn for<'p> FnMut(&'p Page) + Send),
    ) -> sumi_audit::Result<()> {
        for url in &self.pages {
            let url = Url::parse(url).map_err(AuditError::UrlParse)?;
            on_page(&Page::new(url, 200));
        }
        Err(AuditError::Spider("connection reset mid-crawl".to_string()))
    }

    fn pause(&self) {}

    fn resume(&self) {}

    fn redirects(&self) -> Vec<String> {
        Vec::new()
    }

    fn sitemap(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Config restricted to the given paths, so no crawl happens
pub fn restricted_config(target: &str, paths: &[&str]) -> Config {
    let mut config = Config::for_target(target);
    config.scan.restrict_paths = paths.iter().map(|p| p.to_string()).collect();
    config
}

/// Records every page it is run against
pub struct Recorder {
    name: String,
    priority: u32,
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new(name: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Module for Recorder {
    fn info(&self) -> ModuleInfo {
        ModuleInfo {
            name: self.name.clone(),
            description: "records audited pages".to_string(),
            priority: self.priority,
        }
    }

    async fn run(&self, page: &Page, ctx: &ModuleContext) -> Result<(), ModuleError> {
        self.seen.lock().unwrap().push(page.id().to_string());
        ctx.register_issue(Issue::new(
            "Visited",
            self.name.clone(),
            page.url(),
            Severity::Informational,
            "page was audited",
        ));
        Ok(())
    }
}

/// Panics on every page
pub struct Panicky;

#[async_trait]
impl Module for Panicky {
    fn info(&self) -> ModuleInfo {
        ModuleInfo {
            name: "panicky".to_string(),
            description: "always panics".to_string(),
            priority: 1,
        }
    }

    async fn run(&self, _page: &Page, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        panic!("module blew up");
    }
}

/// Returns an error on every page
pub struct Failing;

#[async_trait]
impl Module for Failing {
    fn info(&self) -> ModuleInfo {
        ModuleInfo {
            name: "failing".to_string(),
            description: "always errors".to_string(),
            priority: 2,
        }
    }

    async fn run(&self, _page: &Page, _ctx: &ModuleContext) -> Result<(), ModuleError> {
        Err(ModuleError::Failed("nope".to_string()))
    }
}

/// Counts of each URL in a list
pub fn tally(urls: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for url in urls {
        *counts.entry(url.as_str()).or_insert(0) += 1;
    }
    counts
}
