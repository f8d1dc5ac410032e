//! Breadth-first spider over the scan target
//!
//! The spider walks in-scope links starting from the target URL, bounded by
//! the configured depth and page limits. Redirects are recorded and their
//! `Location` followed at the same depth; every other fetched page, sentinel
//! pages included, is handed to the caller.

use crate::audit::{Fetcher, Page, Spider};
use crate::config::Config;
use crate::crawler::parser::parse_html;
use crate::url::{resolve_url, ExclusionPolicy};
use crate::AuditError;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A URL waiting to be fetched, with its link distance from the target
#[derive(Debug, Clone)]
struct QueuedUrl {
    url: Url,
    depth: u32,
}

pub struct HtmlSpider {
    fetcher: Arc<dyn Fetcher>,
    policy: ExclusionPolicy,
    max_pages: usize,
    max_depth: u32,
    paused: AtomicBool,
    redirects: Mutex<BTreeSet<String>>,
    sitemap: Mutex<BTreeSet<String>>,
}

impl HtmlSpider {
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>) -> Result<Self, AuditError> {
        Ok(Self {
            fetcher,
            policy: ExclusionPolicy::from_config(config)?,
            max_pages: config.spider.max_pages as usize,
            max_depth: config.spider.max_depth,
            paused: AtomicBool::new(false),
            redirects: Mutex::new(BTreeSet::new()),
            sitemap: Mutex::new(BTreeSet::new()),
        })
    }

    fn redirect_set(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.redirects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sitemap_set(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.sitemap.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn wait_while_paused(&self) {
        while self.paused.load(Ordering::SeqCst) {
            tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
        }
    }

    /// Links and form actions of an HTML page that stay in scope
    fn discover(&self, page: &Page) -> Vec<Url> {
        let parsed = parse_html(page.body(), page.url());
        parsed
            .all_urls()
            .filter_map(|link| resolve_url(page.url(), link).ok())
            .filter(|url| !self.policy.is_excluded(url))
            .collect()
    }
}

#[async_trait]
impl Spider for HtmlSpider {
    async fn run(
        &self,
        on_page: &mut (dyn for<'p> FnMut(&'p Page) + Send),
    ) -> crate::Result<()> {
        self.redirect_set().clear();
        self.sitemap_set().clear();

        let mut frontier: VecDeque<QueuedUrl> = VecDeque::new();
        let mut seen: HashSet<String> = HashSet::new();

        let start = self.policy.target().clone();
        seen.insert(start.to_string());
        frontier.push_back(QueuedUrl {
            url: start,
            depth: 0,
        });

        let mut fetched = 0usize;
        while let Some(queued) = frontier.pop_front() {
            if fetched >= self.max_pages {
                tracing::info!("Spider reached its page limit ({})", self.max_pages);
                break;
            }
            self.wait_while_paused().await;

            let page = self.fetcher.fetch(&queued.url).await;
            fetched += 1;
            self.sitemap_set().insert(queued.url.to_string());

            if page.is_redirect() {
                self.redirect_set().insert(queued.url.to_string());
                let target = page
                    .header("location")
                    .and_then(|location| resolve_url(page.url(), location).ok());
                if let Some(target) = target {
                    if !self.policy.is_excluded(&target) && seen.insert(target.to_string()) {
                        tracing::debug!("Following redirect {} -> {}", queued.url, target);
                        frontier.push_back(QueuedUrl {
                            url: target,
                            depth: queued.depth,
                        });
                    }
                }
                continue;
            }

            on_page(&page);

            if page.is_no_response() || !page.is_html() || queued.depth >= self.max_depth {
                continue;
            }

            for url in self.discover(&page) {
                if seen.insert(url.to_string()) {
                    frontier.push_back(QueuedUrl {
                        url,
                        depth: queued.depth + 1,
                    });
                }
            }
        }

        tracing::info!(
            "Spider finished: {} page(s) fetched, {} redirect(s)",
            fetched,
            self.redirect_set().len()
        );
        Ok(())
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn redirects(&self) -> Vec<String> {
        self.redirect_set().iter().cloned().collect()
    }

    fn sitemap(&self) -> Vec<String> {
        self.sitemap_set().iter().cloned().collect()
    }
}
