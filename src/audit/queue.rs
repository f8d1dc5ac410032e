//! URL and page work queues with feedback re-injection
//!
//! The pipeline is owned by the scan driver. Anything else that needs to
//! feed work back (observers, module callbacks, a remote controller) holds a
//! [`QueueHandle`]; accepted items travel over a channel and are absorbed by
//! the driver before it checks whether the queues have reached a fixed point.

use crate::audit::Page;
use crate::config::RedundantRule;
use crate::url::{ExclusionPolicy, RedundancyBudget};
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

enum Feedback {
    Url(Url),
    Page(Arc<Page>),
}

/// Thread-safe entry point into the queues
#[derive(Clone)]
pub struct QueueHandle {
    policy: Arc<ExclusionPolicy>,
    tx: mpsc::UnboundedSender<Feedback>,
}

impl QueueHandle {
    /// Offers a URL (absolute, or relative to the scan target)
    ///
    /// Returns false if the URL cannot be resolved or is out of scope.
    pub fn push_url(&self, url: &str) -> bool {
        let Ok(resolved) = self.policy.resolve(url) else {
            return false;
        };
        if self.policy.is_excluded(&resolved) {
            return false;
        }
        self.tx.send(Feedback::Url(resolved)).is_ok()
    }

    /// Offers a page for auditing
    pub fn push_page(&self, page: Page) -> bool {
        if self.policy.is_excluded(page.url()) {
            return false;
        }
        self.tx.send(Feedback::Page(Arc::new(page))).is_ok()
    }
}

/// The scan's two FIFO work queues, the sitemap and cumulative counters
pub struct QueuePipeline {
    policy: Arc<ExclusionPolicy>,
    redundancy: RedundancyBudget,
    url_queue: VecDeque<Url>,
    page_queue: VecDeque<Arc<Page>>,
    sitemap: BTreeSet<String>,
    url_queue_total_size: u64,
    page_queue_total_size: u64,
    feedback_tx: mpsc::UnboundedSender<Feedback>,
    feedback_rx: mpsc::UnboundedReceiver<Feedback>,
}

impl QueuePipeline {
    pub fn new(policy: Arc<ExclusionPolicy>, redundant: Vec<RedundantRule>) -> Self {
        let (feedback_tx, feedback_rx) = mpsc::unbounded_channel();
        Self {
            policy,
            redundancy: RedundancyBudget::new(redundant),
            url_queue: VecDeque::new(),
            page_queue: VecDeque::new(),
            sitemap: BTreeSet::new(),
            url_queue_total_size: 0,
            page_queue_total_size: 0,
            feedback_tx,
            feedback_rx,
        }
    }

    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            policy: self.policy.clone(),
            tx: self.feedback_tx.clone(),
        }
    }

    pub fn policy(&self) -> &ExclusionPolicy {
        &self.policy
    }

    /// Enqueues a URL after scope and redundancy checks
    ///
    /// A rejected URL leaves every queue, counter and the sitemap untouched.
    pub fn push_url(&mut self, url: &str) -> bool {
        let resolved = match self.policy.resolve(url) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!("Ignoring unresolvable URL {}: {}", url, e);
                return false;
            }
        };
        self.push_resolved_url(resolved)
    }

    fn push_resolved_url(&mut self, url: Url) -> bool {
        if self.policy.is_excluded(&url) {
            tracing::debug!("Excluded by scope: {}", url);
            return false;
        }
        if !self.redundancy.consume(&url) {
            return false;
        }

        self.sitemap.insert(url.as_str().to_string());
        self.url_queue.push_back(url);
        self.url_queue_total_size += 1;
        true
    }

    /// Puts a URL back at the tail of the URL queue for another attempt
    ///
    /// The URL already passed scope checks when it was first queued.
    pub fn requeue_url(&mut self, url: Url) {
        self.sitemap.insert(url.as_str().to_string());
        self.url_queue.push_back(url);
        self.url_queue_total_size += 1;
    }

    /// Enqueues a page for auditing
    pub fn push_page(&mut self, page: impl Into<Arc<Page>>) -> bool {
        let page = page.into();
        if self.policy.is_excluded(page.url()) {
            tracing::debug!("Excluded by scope: {}", page.url());
            return false;
        }

        self.sitemap.insert(page.id().to_string());
        self.page_queue.push_back(page);
        self.page_queue_total_size += 1;
        true
    }

    pub fn pop_url(&mut self) -> Option<Url> {
        self.url_queue.pop_front()
    }

    pub fn pop_page(&mut self) -> Option<Arc<Page>> {
        self.page_queue.pop_front()
    }

    /// Moves everything pushed through handles into the queues
    ///
    /// Returns the number of items accepted.
    pub fn absorb_feedback(&mut self) -> usize {
        let mut accepted = 0;
        while let Ok(item) = self.feedback_rx.try_recv() {
            let ok = match item {
                Feedback::Url(url) => self.push_resolved_url(url),
                Feedback::Page(page) => self.push_page(page),
            };
            if ok {
                accepted += 1;
            }
        }
        accepted
    }

    /// Adds a URL to the sitemap without queueing it
    pub fn add_to_sitemap(&mut self, url: &Url) {
        self.sitemap.insert(url.as_str().to_string());
    }

    /// True when neither queue holds work
    pub fn is_empty(&self) -> bool {
        self.url_queue.is_empty() && self.page_queue.is_empty()
    }

    pub fn url_queue_size(&self) -> usize {
        self.url_queue.len()
    }

    pub fn page_queue_size(&self) -> usize {
        self.page_queue.len()
    }

    /// Cumulative number of URL pushes, never decremented
    pub fn url_queue_total_size(&self) -> u64 {
        self.url_queue_total_size
    }

    /// Cumulative number of page pushes, never decremented
    pub fn page_queue_total_size(&self) -> u64 {
        self.page_queue_total_size
    }

    pub fn sitemap(&self) -> &BTreeSet<String> {
        &self.sitemap
    }

    /// Redundancy rules with their remaining budgets
    pub fn redundant_rules(&self) -> &[RedundantRule] {
        self.redundancy.rules()
    }

    /// Empties queues, sitemap and counters and restores redundancy budgets
    pub fn reset(&mut self, redundant: Vec<RedundantRule>) {
        while self.feedback_rx.try_recv().is_ok() {}
        self.redundancy = RedundancyBudget::new(redundant);
        self.url_queue.clear();
        self.page_queue.clear();
        self.sitemap.clear();
        self.url_queue_total_size = 0;
        self.page_queue_total_size = 0;
    }
}
