//! Interfaces of the collaborators the scan driver depends on
//!
//! The framework only ever talks to these traits. Built-in implementations
//! live in [`crate::crawler`] (spider, fetcher, HTTP runner); tests plug in
//! their own.

use crate::audit::Page;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// Discovers pages of the target
#[async_trait]
pub trait Spider: Send + Sync {
    /// Crawls the target, calling `on_page` for every page fetched
    async fn run(
        &self,
        on_page: &mut (dyn for<'p> FnMut(&'p Page) + Send),
    ) -> crate::Result<()>;

    /// Suspends traversal at the spider's next opportunity
    fn pause(&self);

    fn resume(&self);

    /// URLs that only ever answered with a redirect
    fn redirects(&self) -> Vec<String>;

    /// Every URL the spider has seen
    fn sitemap(&self) -> Vec<String>;
}

/// Turns a URL into a [`Page`]
///
/// Never fails: a request without a response yields a page whose status is
/// [`crate::audit::NO_RESPONSE`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Page;
}

/// Callback invoked with the response of a queued request
pub type ResponseCallback = Box<dyn FnOnce(Page) + Send>;

/// Aggregate counters reported by the HTTP layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpStatistics {
    pub request_count: u64,
    pub response_count: u64,
    pub time_out_count: u64,
    /// Average response time (seconds) of the current burst
    pub curr_res_time: f64,
    /// Responses received in the current burst
    pub curr_res_cnt: u64,
    /// Responses per second in the current burst
    pub curr_res_per_second: f64,
    /// Average response time (seconds) over the whole scan
    pub average_res_time: f64,
    pub max_concurrency: u32,
}

/// Asynchronous request execution used by modules
///
/// Modules queue requests with callbacks; the scheduler flushes the queue
/// by calling [`HttpRunner::run`], which returns once every request of the
/// round has completed and its callback has run.
#[async_trait]
pub trait HttpRunner: Send + Sync {
    fn queue(&self, url: Url, callback: ResponseCallback);

    /// Executes every queued request
    async fn run(&self);

    fn statistics(&self) -> HttpStatistics;

    /// Drops pending requests and zeroes counters
    fn reset(&self);
}

/// Keeps the scanner authenticated against the target
#[async_trait]
pub trait Session: Send + Sync {
    async fn ensure_logged_in(&self);
}

/// Session for targets that need no login
pub struct NoSession;

#[async_trait]
impl Session for NoSession {
    async fn ensure_logged_in(&self) {}
}

/// Spider that discovers nothing
///
/// Used when a scan is driven purely through restrict-paths or by pushing
/// pages from a controller.
pub struct NullSpider;

#[async_trait]
impl Spider for NullSpider {
    async fn run(
        &self,
        _on_page: &mut (dyn for<'p> FnMut(&'p Page) + Send),
    ) -> crate::Result<()> {
        Ok(())
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
