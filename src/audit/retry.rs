//! Bounded per-URL retry bookkeeping

use std::collections::{BTreeSet, HashMap};
use url::Url;

/// Maximum number of fetch attempts for a URL before it is abandoned
pub const AUDIT_PAGE_MAX_TRIES: u32 = 5;

/// What the caller should do with a URL whose fetch got no response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    /// Re-queue the URL at the tail of the URL queue
    Retry,
    /// The URL is in the failure set and must not be queued again
    Abandon,
}

/// Tracks failed attempts per URL and the set of abandoned URLs
///
/// A URL is fetched at most `max_tries` times: the failure that brings its
/// attempt count to `max_tries` moves it to the failure set.
#[derive(Debug)]
pub struct RetryController {
    max_tries: u32,
    ledger: HashMap<String, u32>,
    failures: BTreeSet<String>,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(AUDIT_PAGE_MAX_TRIES)
    }
}

impl RetryController {
    pub fn new(max_tries: u32) -> Self {
        Self {
            max_tries: max_tries.max(1),
            ledger: HashMap::new(),
            failures: BTreeSet::new(),
        }
    }

    /// Records a failed fetch of `url` and decides whether to retry it
    pub fn on_fetch_failure(&mut self, url: &Url) -> RetryVerdict {
        let id = url.as_str();
        if self.failures.contains(id) {
            return RetryVerdict::Abandon;
        }

        let attempts = self.ledger.entry(id.to_string()).or_insert(0);
        *attempts += 1;

        if *attempts >= self.max_tries {
            let attempts = *attempts;
            self.ledger.remove(id);
            self.failures.insert(id.to_string());
            tracing::warn!(
                "Giving up on {} after {} attempts without a response",
                url,
                attempts
            );
            RetryVerdict::Abandon
        } else {
            tracing::debug!(
                "No response from {} (attempt {}/{}), retrying",
                url,
                attempts,
                self.max_tries
            );
            RetryVerdict::Retry
        }
    }

    /// Failed attempts recorded for a URL still being retried
    pub fn attempts(&self, url: &Url) -> u32 {
        self.ledger.get(url.as_str()).copied().unwrap_or(0)
    }

    pub fn is_failed(&self, url: &Url) -> bool {
        self.failures.contains(url.as_str())
    }

    /// Abandoned URLs, sorted
    pub fn failures(&self) -> &BTreeSet<String> {
        &self.failures
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    pub fn reset(&mut self) {
        self.ledger.clear();
        self.failures.clear();
    }
}
