//! Module registry: loading, scheduling, fault isolation and findings

use super::{builtin, Issue, Module, ModuleError, ModuleInfo, TimeoutCandidate};
use crate::audit::{Fetcher, HttpRunner, Page, QueueHandle};
use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Scan-wide findings shared by every module invocation
#[derive(Default)]
struct FindingSink {
    issues: Mutex<Vec<Issue>>,
    seen: Mutex<HashSet<(String, String, String)>>,
    candidates: Mutex<Vec<TimeoutCandidate>>,
    only_positives: AtomicBool,
}

impl FindingSink {
    /// Stores an issue once per (module, name, url)
    ///
    /// A verified issue upgrades an unverified one already stored under the
    /// same key; anything else is a duplicate and is dropped.
    fn register(&self, issue: Issue) -> bool {
        let key = (issue.module.clone(), issue.name.clone(), issue.url.clone());
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        let mut issues = self.issues.lock().unwrap_or_else(|e| e.into_inner());
        if seen.insert(key) {
            issues.push(issue);
            return true;
        }
        if !issue.verified {
            return false;
        }

        let existing = issues.iter_mut().find(|stored| {
            !stored.verified
                && stored.module == issue.module
                && stored.name == issue.name
                && stored.url == issue.url
        });
        match existing {
            Some(stored) => {
                stored.verified = true;
                stored.remarks.extend(issue.remarks);
                true
            }
            None => false,
        }
    }

    fn clear(&self) {
        self.issues.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.candidates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Everything a module may touch while auditing a page
#[derive(Clone)]
pub struct ModuleContext {
    http: Arc<dyn HttpRunner>,
    queue: QueueHandle,
    findings: Arc<FindingSink>,
}

impl ModuleContext {
    /// HTTP runner for follow-up requests; queued requests are flushed after
    /// every module has run on the page
    pub fn http(&self) -> &Arc<dyn HttpRunner> {
        &self.http
    }

    /// Feeds newly discovered URLs or pages back into the scan
    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    /// Logs an issue; duplicates of (module, name, url) are dropped
    pub fn register_issue(&self, issue: Issue) -> bool {
        self.findings.register(issue)
    }

    /// Defers a time-based finding to the verification pass
    pub fn add_timeout_candidate(&self, candidate: TimeoutCandidate) {
        self.findings
            .candidates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(candidate);
    }
}

/// Loaded modules plus the findings they produce
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
    findings: Arc<FindingSink>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            findings: Arc::new(FindingSink::default()),
        }
    }

    /// Loads built-in modules by name
    ///
    /// Nothing is loaded if any name is unknown.
    pub fn load(&mut self, names: &[String]) -> Result<(), ModuleError> {
        let mut loaded = Vec::with_capacity(names.len());
        for name in names {
            let module = builtin(name).ok_or_else(|| ModuleError::NotFound(name.clone()))?;
            loaded.push(module);
        }
        for module in loaded {
            self.register(module);
        }
        Ok(())
    }

    /// Adds a module instance; a module with the same name replaces nothing
    /// and is ignored
    pub fn register(&mut self, module: Arc<dyn Module>) {
        let name = module.info().name;
        if self.modules.iter().any(|m| m.info().name == name) {
            tracing::debug!("Module {} already loaded", name);
            return;
        }
        tracing::debug!("Loaded module {}", name);
        self.modules.push(module);
    }

    /// Unloads every module
    pub fn clear(&mut self) {
        self.modules.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn list(&self) -> Vec<ModuleInfo> {
        self.modules.iter().map(|m| m.info()).collect()
    }

    /// Modules in run order: ascending priority, then load order
    pub fn schedule(&self) -> Vec<Arc<dyn Module>> {
        let mut scheduled = self.modules.clone();
        scheduled.sort_by_key(|m| m.info().priority);
        scheduled
    }

    pub fn context(&self, http: Arc<dyn HttpRunner>, queue: QueueHandle) -> ModuleContext {
        ModuleContext {
            http,
            queue,
            findings: self.findings.clone(),
        }
    }

    /// Runs one module against a page in its own task
    ///
    /// Both returned errors and panics come back as `Err`.
    pub async fn run_one(
        &self,
        module: &Arc<dyn Module>,
        page: &Arc<Page>,
        ctx: &ModuleContext,
    ) -> Result<(), ModuleError> {
        let module = module.clone();
        let page = page.clone();
        let ctx = ctx.clone();

        let task = tokio::spawn(async move { module.run(&page, &ctx).await });
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(ModuleError::Panicked(panic_message(e.into_panic()))),
            Err(e) => Err(ModuleError::Failed(e.to_string())),
        }
    }

    /// Restricts `results` to verified issues while enabled
    pub fn set_only_positives(&self, enabled: bool) {
        self.findings.only_positives.store(enabled, Ordering::SeqCst);
    }

    pub fn only_positives(&self) -> bool {
        self.findings.only_positives.load(Ordering::SeqCst)
    }

    /// Issues logged so far, in registration order
    pub fn results(&self) -> Vec<Issue> {
        let issues = self
            .findings
            .issues
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if self.only_positives() {
            issues.iter().filter(|i| i.verified).cloned().collect()
        } else {
            issues.clone()
        }
    }

    pub fn timeout_candidates(&self) -> usize {
        self.findings
            .candidates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn has_timeout_candidates(&self) -> bool {
        self.timeout_candidates() > 0
    }

    /// Verifies every pending timeout candidate against request latency
    ///
    /// A candidate is confirmed when its probe takes at least `delay` while
    /// the unmodified control request does not. Returns the number confirmed.
    pub async fn timeout_verify(&self, fetcher: &dyn Fetcher) -> usize {
        let candidates: Vec<TimeoutCandidate> = std::mem::take(
            &mut *self
                .findings
                .candidates
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );

        let mut confirmed = 0;
        for candidate in candidates {
            let control = fetcher.fetch(&candidate.control).await;
            if control.response_time() >= candidate.delay {
                tracing::debug!(
                    "Discarding timeout candidate from {}: control request to {} was slow too",
                    candidate.module,
                    candidate.control
                );
                continue;
            }

            let probe = fetcher.fetch(&candidate.url).await;
            if probe.response_time() < candidate.delay {
                tracing::debug!(
                    "Discarding timeout candidate from {}: probe answered in {:?}",
                    candidate.module,
                    probe.response_time()
                );
                continue;
            }

            let remark = format!(
                "Probe took {:.2}s against a {:.2}s control",
                probe.response_time().as_secs_f64(),
                control.response_time().as_secs_f64()
            );
            tracing::info!(
                "Confirmed timing issue '{}' from {} at {}",
                candidate.issue.name,
                candidate.module,
                candidate.url
            );
            if self
                .findings
                .register(candidate.issue.with_remark(remark).verified())
            {
                confirmed += 1;
            }
        }
        confirmed
    }

    /// Drops findings and pending candidates, keeping loaded modules
    pub fn reset(&self) {
        self.findings.clear();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
