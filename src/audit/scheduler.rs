//! Per-page module scheduling

use crate::audit::{Fetcher, HttpRunner, Page, QueueHandle, QueuePipeline, Session};
use crate::modules::ModuleRegistry;
use crate::state::PauseCoordinator;
use std::collections::HashSet;
use std::sync::Arc;

/// Hook run on every page right before its modules
pub type AuditObserver = Box<dyn FnMut(&Page, &QueueHandle) + Send>;

/// URLs that went through module scheduling, in audit order
#[derive(Debug, Default, Clone)]
pub struct AuditMap {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl AuditMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str) -> bool {
        if !self.seen.insert(id.to_string()) {
            return false;
        }
        self.order.push(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

/// Runs observers and modules against pages
pub struct ModuleScheduler {
    registry: ModuleRegistry,
    observers: Vec<AuditObserver>,
    http: Arc<dyn HttpRunner>,
    fetcher: Arc<dyn Fetcher>,
    session: Arc<dyn Session>,
    pause: Arc<PauseCoordinator>,
}

impl ModuleScheduler {
    pub fn new(
        registry: ModuleRegistry,
        http: Arc<dyn HttpRunner>,
        fetcher: Arc<dyn Fetcher>,
        session: Arc<dyn Session>,
        pause: Arc<PauseCoordinator>,
    ) -> Self {
        Self {
            registry,
            observers: Vec::new(),
            http,
            fetcher,
            session,
            pause,
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.registry
    }

    pub fn on_audit_page(&mut self, observer: AuditObserver) {
        self.observers.push(observer);
    }

    /// Audits one page
    ///
    /// Returns false, touching nothing, when the page is out of scope.
    /// Module faults are logged and never abort the page.
    pub async fn audit_page(
        &mut self,
        page: Arc<Page>,
        queues: &mut QueuePipeline,
        auditmap: &mut AuditMap,
    ) -> bool {
        if queues.policy().is_excluded(page.url()) {
            tracing::info!("Skipping out-of-scope page {}", page.url());
            return false;
        }

        auditmap.insert(page.id());
        queues.add_to_sitemap(page.url());
        tracing::debug!("Auditing {} ({})", page.url(), page.code());

        let handle = queues.handle();
        for observer in self.observers.iter_mut() {
            observer(&page, &handle);
        }

        let ctx = self.registry.context(self.http.clone(), handle);
        for module in self.registry.schedule() {
            self.pause.wait_if_paused().await;

            if let Err(e) = self.registry.run_one(&module, &page, &ctx).await {
                tracing::warn!(
                    "Module {} faulted on {}: {}",
                    module.info().name,
                    page.url(),
                    e
                );
            }
        }

        // Callbacks from the first round may queue more requests.
        self.http.run().await;
        self.http.run().await;
        self.session.ensure_logged_in().await;

        if self.registry.has_timeout_candidates() {
            self.timeout_verify().await;
        }

        true
    }

    /// Runs the deferred timing verification pass
    pub async fn timeout_verify(&self) -> usize {
        let pending = self.registry.timeout_candidates();
        if pending == 0 {
            return 0;
        }
        tracing::info!("Verifying {} timeout candidate(s)", pending);
        self.registry.timeout_verify(self.fetcher.as_ref()).await
    }
}
