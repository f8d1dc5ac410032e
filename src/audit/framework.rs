//! The scan driver
//!
//! A [`Framework`] owns the queues, retry ledger, sitemap and audit map and
//! walks the scan through its states:
//!
//! ```text
//! ready -> preparing -> crawling -> auditing -> cleanup -> done
//! ```
//!
//! Everything another task may need while the scan runs (status, stats,
//! pause/resume, pushing work) goes through a cloneable [`FrameworkHandle`].

use crate::audit::retry::{RetryController, RetryVerdict};
use crate::audit::scheduler::{AuditMap, ModuleScheduler};
use crate::audit::{
    Fetcher, HttpRunner, NoSession, Page, Platform, QueueHandle, QueuePipeline, Session, Spider,
};
use crate::config::{hash_config, validate, Config};
use crate::crawler::{HtmlSpider, HttpClient};
use crate::modules::{ModuleInfo, ModuleRegistry};
use crate::output::{
    AuditStore, ReportInfo, ReportManager, ReportResult, ScanClock, Stats, StatsInputs, REVISION,
};
use crate::plugins::{PluginInfo, PluginManager};
use crate::state::{PauseCoordinator, ScanStatus};
use crate::url::ExclusionPolicy;
use crate::{AuditError, Result};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// External collaborators a framework is built from
pub struct Collaborators {
    pub spider: Arc<dyn Spider>,
    pub fetcher: Arc<dyn Fetcher>,
    pub http: Arc<dyn HttpRunner>,
    pub session: Arc<dyn Session>,
}

impl Collaborators {
    /// Built-in reqwest client and HTML spider
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Arc::new(HttpClient::new(config)?);
        let spider = Arc::new(HtmlSpider::new(config, client.clone())?);

        Ok(Self {
            spider,
            fetcher: client.clone(),
            http: client,
            session: Arc::new(NoSession),
        })
    }
}

/// Driver-owned counters mirrored for readers on other tasks
#[derive(Debug, Default, Clone)]
struct Counters {
    sitemap_size: usize,
    auditmap_size: usize,
    url_queue_total_size: u64,
    page_queue_total_size: u64,
    failures: usize,
    current_page: Option<String>,
}

/// State shared between the driver and its handles
struct SharedState {
    status: Mutex<ScanStatus>,
    running: AtomicBool,
    pause: Arc<PauseCoordinator>,
    clock: Mutex<ScanClock>,
    counters: Mutex<Counters>,
    spider: Arc<dyn Spider>,
    http: Arc<dyn HttpRunner>,
    queue: QueueHandle,
}

impl SharedState {
    fn status(&self) -> ScanStatus {
        let status = *lock(&self.status);
        if self.pause.is_paused() && status.can_show_paused() {
            ScanStatus::Paused
        } else {
            status
        }
    }

    fn transition(&self, next: ScanStatus) -> Result<()> {
        let mut status = lock(&self.status);
        if !status.can_transition_to(next) {
            return Err(AuditError::InvalidTransition {
                from: *status,
                to: next,
            });
        }
        tracing::info!("Scan status: {} -> {}", *status, next);
        *status = next;
        Ok(())
    }

    fn stats(&self, refresh: bool, override_cache: bool) -> Stats {
        let counters = lock(&self.counters).clone();
        let elapsed = lock(&self.clock).elapsed(
            refresh,
            override_cache,
            counters.auditmap_size,
            counters.sitemap_size,
        );

        Stats::compute(StatsInputs {
            http: self.http.statistics(),
            elapsed,
            sitemap_size: counters.sitemap_size,
            auditmap_size: counters.auditmap_size,
            redirect_count: self.spider.redirects().len(),
            current_page: counters.current_page,
            url_queue_total_size: counters.url_queue_total_size,
            page_queue_total_size: counters.page_queue_total_size,
            failures: counters.failures,
        })
    }
}

/// Cloneable remote control for a running framework
#[derive(Clone)]
pub struct FrameworkHandle {
    shared: Arc<SharedState>,
}

impl FrameworkHandle {
    /// Current status; `paused` overlays any active state while paused
    pub fn status(&self) -> ScanStatus {
        self.shared.status()
    }

    pub fn stats(&self, refresh: bool, override_cache: bool) -> Stats {
        self.shared.stats(refresh, override_cache)
    }

    pub fn pause(&self, caller: &str) -> bool {
        self.shared.pause.pause(caller)
    }

    pub fn resume(&self, caller: &str) -> bool {
        self.shared.pause.resume(caller)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.pause.is_paused()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Queues a URL for auditing; false if it is out of scope
    pub fn push_to_url_queue(&self, url: &str) -> bool {
        self.shared.queue.push_url(url)
    }

    /// Queues a page for auditing; false if it is out of scope
    pub fn push_to_page_queue(&self, page: Page) -> bool {
        self.shared.queue.push_page(page)
    }
}

/// Scan orchestrator
pub struct Framework {
    config: Config,
    config_hash: String,
    queues: QueuePipeline,
    retry: RetryController,
    auditmap: AuditMap,
    scheduler: ModuleScheduler,
    plugins: PluginManager,
    reports: ReportManager,
    spider: Arc<dyn Spider>,
    fetcher: Arc<dyn Fetcher>,
    http: Arc<dyn HttpRunner>,
    shared: Arc<SharedState>,
}

impl Framework {
    /// Builds a framework with the built-in collaborators
    pub fn new(config: Config) -> Result<Self> {
        validate(&config)?;
        let collaborators = Collaborators::from_config(&config)?;
        Self::with_collaborators(config, collaborators)
    }

    /// Builds a framework around caller-supplied collaborators
    ///
    /// Modules and plugins named in the configuration are loaded here.
    pub fn with_collaborators(config: Config, collaborators: Collaborators) -> Result<Self> {
        let Collaborators {
            spider,
            fetcher,
            http,
            session,
        } = collaborators;

        let policy = Arc::new(ExclusionPolicy::from_config(&config)?);
        let queues = QueuePipeline::new(policy, config.redundant.clone());

        let mut registry = ModuleRegistry::new();
        registry.load(&config.scan.modules)?;
        registry.set_only_positives(config.scan.only_positives);

        let mut plugins = PluginManager::new();
        plugins.load(&config.scan.plugins)?;

        let pause = Arc::new(PauseCoordinator::new(spider.clone()));
        let scheduler = ModuleScheduler::new(
            registry,
            http.clone(),
            fetcher.clone(),
            session,
            pause.clone(),
        );

        let shared = Arc::new(SharedState {
            status: Mutex::new(ScanStatus::Ready),
            running: AtomicBool::new(false),
            pause,
            clock: Mutex::new(ScanClock::new()),
            counters: Mutex::new(Counters::default()),
            spider: spider.clone(),
            http: http.clone(),
            queue: queues.handle(),
        });

        Ok(Self {
            config_hash: hash_config(&config),
            config,
            queues,
            retry: RetryController::default(),
            auditmap: AuditMap::new(),
            scheduler,
            plugins,
            reports: ReportManager::new(),
            spider,
            fetcher,
            http,
            shared,
        })
    }

    /// Records the hash of the configuration file the scan came from
    pub fn set_config_hash(&mut self, hash: impl Into<String>) {
        self.config_hash = hash.into();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handle(&self) -> FrameworkHandle {
        FrameworkHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn modules_mut(&mut self) -> &mut ModuleRegistry {
        self.scheduler.registry_mut()
    }

    pub fn plugins_mut(&mut self) -> &mut PluginManager {
        &mut self.plugins
    }

    pub fn reports_mut(&mut self) -> &mut ReportManager {
        &mut self.reports
    }

    /// Registers a hook run on every page before its modules
    pub fn on_audit_page<F>(&mut self, observer: F)
    where
        F: FnMut(&Page, &QueueHandle) + Send + 'static,
    {
        self.scheduler.on_audit_page(Box::new(observer));
    }

    /// Runs the scan to completion
    ///
    /// Faults while crawling or auditing are logged; the scan still cleans up,
    /// reaches `done` and writes its reports. Only a framework that is not
    /// `ready` is refused.
    pub async fn run(&mut self) -> Result<()> {
        self.shared.transition(ScanStatus::Preparing)?;

        lock(&self.shared.clock).start();
        self.shared.running.store(true, Ordering::SeqCst);
        self.plugins.run(&self.handle());

        if let Err(e) = self.crawl_and_audit().await {
            tracing::error!("Scan aborted: {}", e);
        }

        self.cleanup().await;

        if let Err(e) = self.shared.transition(ScanStatus::Done) {
            tracing::error!("{}", e);
            *lock(&self.shared.status) = ScanStatus::Done;
        }

        if !self.config.reports.is_empty() {
            let store = self.audit_store();
            self.reports.run(&store, &self.config.reports);
        }

        let stats = self.stats(false, false);
        tracing::info!(
            "Scan finished in {}: {} pages audited, {} issues, {} failed URLs",
            stats.time,
            stats.auditmap_size,
            self.scheduler.registry().results().len(),
            stats.failures
        );
        Ok(())
    }

    async fn crawl_and_audit(&mut self) -> Result<()> {
        self.shared.transition(ScanStatus::Crawling)?;
        self.shared.pause.wait_if_paused().await;

        if self.config.scan.restrict_paths.is_empty() {
            self.crawl().await?;
        } else {
            tracing::info!(
                "Restricting scan to {} configured path(s), skipping the crawl",
                self.config.scan.restrict_paths.len()
            );
            for path in &self.config.scan.restrict_paths {
                if !self.queues.push_url(path) {
                    tracing::warn!("Restricted path {} is out of scope", path);
                }
            }
        }
        self.sync_counters();

        if self.scheduler.registry().is_empty() {
            tracing::info!("No modules loaded, nothing to audit");
            return Ok(());
        }

        self.shared.transition(ScanStatus::Auditing)?;
        self.audit_queues().await;
        Ok(())
    }

    async fn crawl(&mut self) -> Result<()> {
        let spider = self.spider.clone();
        let shared = self.shared.clone();
        let queues = &mut self.queues;

        spider
            .run(&mut |page: &Page| {
                if queues.push_url(page.url().as_str()) {
                    lock(&shared.counters).sitemap_size = queues.sitemap().len();
                }
            })
            .await?;

        // Redirects and other URLs seen but never handed over still count as
        // discovered.
        for seen in spider.sitemap() {
            if let Ok(url) = Url::parse(&seen) {
                if !self.queues.policy().is_excluded(&url) {
                    self.queues.add_to_sitemap(&url);
                }
            }
        }

        tracing::info!(
            "Crawl finished: {} URLs queued, {} redirects",
            self.queues.url_queue_size(),
            spider.redirects().len()
        );
        Ok(())
    }

    /// Drains both queues to a fixed point
    ///
    /// Pages discovered while auditing a page are audited before the next URL
    /// is popped. Timing verification runs once the queues are empty and the
    /// loop continues if it produced new work.
    async fn audit_queues(&mut self) {
        loop {
            self.drain_page_queue().await;

            if let Some(url) = self.queues.pop_url() {
                self.audit_url(url).await;
                continue;
            }

            self.scheduler.timeout_verify().await;
            self.queues.absorb_feedback();
            if self.queues.is_empty() {
                break;
            }
        }
        self.sync_counters();
    }

    async fn drain_page_queue(&mut self) {
        loop {
            self.queues.absorb_feedback();
            let Some(page) = self.queues.pop_page() else {
                break;
            };
            self.shared.pause.wait_if_paused().await;
            self.audit_page_arc(page).await;
        }
    }

    async fn audit_url(&mut self, url: Url) {
        if self.retry.is_failed(&url) {
            tracing::debug!("Not fetching {}: already abandoned", url);
            return;
        }

        self.shared.pause.wait_if_paused().await;
        let page = self.fetcher.fetch(&url).await;

        if page.is_no_response() {
            if self.retry.on_fetch_failure(&url) == RetryVerdict::Retry {
                self.queues.requeue_url(url);
            }
            self.sync_counters();
            return;
        }

        self.queues.push_page(page);
    }

    async fn audit_page_arc(&mut self, page: Arc<Page>) -> bool {
        lock(&self.shared.counters).current_page = Some(page.id().to_string());
        let audited = self
            .scheduler
            .audit_page(page, &mut self.queues, &mut self.auditmap)
            .await;
        self.sync_counters();
        audited
    }

    /// Audits a single page right away
    ///
    /// Returns false when the page is out of scope.
    pub async fn audit_page(&mut self, page: Page) -> bool {
        self.audit_page_arc(Arc::new(page)).await
    }

    async fn cleanup(&mut self) {
        if let Err(e) = self.shared.transition(ScanStatus::Cleanup) {
            tracing::error!("{}", e);
            *lock(&self.shared.status) = ScanStatus::Cleanup;
        }

        lock(&self.shared.clock).finish();
        self.scheduler.registry().set_only_positives(false);
        self.shared.running.store(false, Ordering::SeqCst);
        self.plugins.block().await;
        lock(&self.shared.counters).current_page = None;
        self.sync_counters();
    }

    fn sync_counters(&self) {
        let mut counters = lock(&self.shared.counters);
        counters.sitemap_size = self.queues.sitemap().len();
        counters.auditmap_size = self.auditmap.len();
        counters.url_queue_total_size = self.queues.url_queue_total_size();
        counters.page_queue_total_size = self.queues.page_queue_total_size();
        counters.failures = self.retry.failures().len();
    }

    pub fn pause(&self, caller: &str) -> bool {
        self.shared.pause.pause(caller)
    }

    pub fn resume(&self, caller: &str) -> bool {
        self.shared.pause.resume(caller)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.pause.is_paused()
    }

    pub fn status(&self) -> ScanStatus {
        self.shared.status()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self, refresh: bool, override_cache: bool) -> Stats {
        self.shared.stats(refresh, override_cache)
    }

    pub fn push_to_url_queue(&mut self, url: &str) -> bool {
        let accepted = self.queues.push_url(url);
        self.sync_counters();
        accepted
    }

    pub fn push_to_page_queue(&mut self, page: Page) -> bool {
        let accepted = self.queues.push_page(page);
        self.sync_counters();
        accepted
    }

    /// Every URL discovered so far, sorted
    pub fn sitemap(&self) -> Vec<String> {
        let mut sitemap: BTreeSet<String> = self.queues.sitemap().clone();
        sitemap.extend(self.spider.sitemap());
        sitemap.into_iter().collect()
    }

    /// URLs that went through module scheduling, in audit order
    pub fn auditmap(&self) -> &[String] {
        self.auditmap.as_slice()
    }

    /// URLs abandoned after repeated fetch failures, sorted
    pub fn failures(&self) -> Vec<String> {
        self.retry.failures().iter().cloned().collect()
    }

    /// Snapshot of everything the scan has produced so far
    pub fn audit_store(&self) -> AuditStore {
        let clock = lock(&self.shared.clock);
        AuditStore {
            version: env!("CARGO_PKG_VERSION").to_string(),
            revision: REVISION.to_string(),
            config_hash: self.config_hash.clone(),
            // Redundancy budgets are spent on the pipeline's own copy.
            options: self.config.clone(),
            sitemap: self.sitemap(),
            issues: self.scheduler.registry().results(),
            plugins: self.plugins.results().clone(),
            failures: self.failures(),
            start_datetime: clock.started_at(),
            finish_datetime: clock.finished_at(),
            delta_time_secs: clock.current().as_secs_f64(),
        }
    }

    /// Returns a finished framework to `ready` for another scan
    pub fn reset(&mut self) -> Result<()> {
        let status = *lock(&self.shared.status);
        if status.is_active() {
            return Err(AuditError::InvalidTransition {
                from: status,
                to: ScanStatus::Ready,
            });
        }

        self.queues.reset(self.config.redundant.clone());
        self.retry.reset();
        self.auditmap.clear();
        self.scheduler.registry().reset();
        self.scheduler
            .registry()
            .set_only_positives(self.config.scan.only_positives);
        self.plugins.reset();
        self.http.reset();
        self.shared.pause.clear();
        lock(&self.shared.clock).reset();
        *lock(&self.shared.counters) = Counters::default();
        self.shared.running.store(false, Ordering::SeqCst);
        *lock(&self.shared.status) = ScanStatus::Ready;
        tracing::debug!("Framework reset");
        Ok(())
    }

    pub fn list_modules(&self) -> Vec<ModuleInfo> {
        self.scheduler.registry().list()
    }

    pub fn list_reports(&self) -> Vec<ReportInfo> {
        self.reports.list()
    }

    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        self.plugins.list()
    }

    pub fn list_platforms(&self) -> Vec<Platform> {
        Platform::all()
    }

    /// Renders `store` with the named report and returns the output
    pub fn report_as(&self, name: &str, store: &AuditStore) -> ReportResult<Vec<u8>> {
        self.reports.report_as(name, store)
    }
}
