//! HTTP client implementation
//!
//! This module handles all HTTP requests made during a scan:
//! - Building the reqwest client with the configured user agent and timeout
//! - Single fetches that never fail (no response yields a sentinel page)
//! - Queued requests with callbacks, executed concurrently in rounds
//! - Request, response, timeout and latency statistics

use crate::audit::{fingerprint, Fetcher, HttpRunner, HttpStatistics, Page, ResponseCallback};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// Redirects are not followed so that the spider can record them.
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent_string())
        .timeout(Duration::from_millis(config.http.timeout_ms))
        .connect_timeout(Duration::from_millis(config.http.timeout_ms))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Counters for the current `run` round
#[derive(Debug, Default)]
struct Burst {
    responses: u64,
    response_time: Duration,
    started: Option<Instant>,
    elapsed: Duration,
}

struct ClientInner {
    client: Client,
    request_count: AtomicU64,
    response_count: AtomicU64,
    time_out_count: AtomicU64,
    total_response_micros: AtomicU64,
    burst: Mutex<Burst>,
}

impl ClientInner {
    fn burst(&self) -> MutexGuard<'_, Burst> {
        self.burst.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_response(&self, elapsed: Duration) {
        self.response_count.fetch_add(1, Ordering::Relaxed);
        self.total_response_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);

        let mut burst = self.burst();
        if burst.started.is_some() {
            burst.responses += 1;
            burst.response_time += elapsed;
        }
    }

    async fn get(&self, url: &Url) -> Page {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                if e.is_timeout() {
                    self.time_out_count.fetch_add(1, Ordering::Relaxed);
                }
                tracing::debug!("No response from {}: {}", url, e);
                return Page::no_response(url.clone()).with_response_time(started.elapsed());
            }
        };

        let code = response.status().as_u16();
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Failed to read body of {}: {}", url, e);
                String::new()
            }
        };

        let elapsed = started.elapsed();
        self.record_response(elapsed);

        let platforms = fingerprint(url, &headers);
        Page::new(url.clone(), code)
            .with_headers(headers)
            .with_body(body)
            .with_platforms(platforms)
            .with_response_time(elapsed)
    }
}

/// reqwest-backed fetcher and request runner
pub struct HttpClient {
    inner: Arc<ClientInner>,
    max_concurrency: u32,
    pending: Mutex<Vec<(Url, ResponseCallback)>>,
}

impl HttpClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            inner: Arc::new(ClientInner {
                client: build_http_client(config)?,
                request_count: AtomicU64::new(0),
                response_count: AtomicU64::new(0),
                time_out_count: AtomicU64::new(0),
                total_response_micros: AtomicU64::new(0),
                burst: Mutex::new(Burst::default()),
            }),
            max_concurrency: config.http.max_concurrency.max(1),
            pending: Mutex::new(Vec::new()),
        })
    }

    fn pending(&self) -> MutexGuard<'_, Vec<(Url, ResponseCallback)>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of queued requests not yet run
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, url: &Url) -> Page {
        self.inner.get(url).await
    }
}

#[async_trait]
impl HttpRunner for HttpClient {
    fn queue(&self, url: Url, callback: ResponseCallback) {
        self.pending().push((url, callback));
    }

    async fn run(&self) {
        let batch: Vec<(Url, ResponseCallback)> = std::mem::take(&mut *self.pending());
        if batch.is_empty() {
            return;
        }

        tracing::debug!("Running {} queued request(s)", batch.len());
        {
            let mut burst = self.inner.burst();
            *burst = Burst {
                started: Some(Instant::now()),
                ..Burst::default()
            };
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency as usize));
        let mut tasks = JoinSet::new();
        for (url, callback) in batch {
            let inner = self.inner.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let page = inner.get(&url).await;
                callback(page);
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::warn!("Request callback failed: {}", e);
            }
        }

        let mut burst = self.inner.burst();
        if let Some(started) = burst.started {
            burst.elapsed = started.elapsed();
        }
    }

    fn statistics(&self) -> HttpStatistics {
        let responses = self.inner.response_count.load(Ordering::Relaxed);
        let total_micros = self.inner.total_response_micros.load(Ordering::Relaxed);
        let burst = self.inner.burst();

        let curr_res_time = if burst.responses > 0 {
            burst.response_time.as_secs_f64() / burst.responses as f64
        } else {
            0.0
        };
        let burst_secs = burst.elapsed.as_secs_f64();
        let curr_res_per_second = if burst_secs > 0.0 {
            burst.responses as f64 / burst_secs
        } else {
            0.0
        };

        HttpStatistics {
            request_count: self.inner.request_count.load(Ordering::Relaxed),
            response_count: responses,
            time_out_count: self.inner.time_out_count.load(Ordering::Relaxed),
            curr_res_time,
            curr_res_cnt: burst.responses,
            curr_res_per_second,
            average_res_time: if responses > 0 {
                total_micros as f64 / 1_000_000.0 / responses as f64
            } else {
                0.0
            },
            max_concurrency: self.max_concurrency,
        }
    }

    fn reset(&self) {
        self.pending().clear();
        self.inner.request_count.store(0, Ordering::Relaxed);
        self.inner.response_count.store(0, Ordering::Relaxed);
        self.inner.time_out_count.store(0, Ordering::Relaxed);
        self.inner.total_response_micros.store(0, Ordering::Relaxed);
        *self.inner.burst() = Burst::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let config = Config::for_target("https://example.com/");
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_fresh_statistics() {
        let mut config = Config::for_target("https://example.com/");
        config.http.max_concurrency = 7;
        let client = HttpClient::new(&config).unwrap();

        let stats = client.statistics();
        assert_eq!(stats.request_count, 0);
        assert_eq!(stats.average_res_time, 0.0);
        assert_eq!(stats.max_concurrency, 7);
    }

    #[tokio::test]
    async fn test_queue_and_reset() {
        let client = HttpClient::new(&Config::for_target("https://example.com/")).unwrap();
        client.queue(
            Url::parse("https://example.com/").unwrap(),
            Box::new(|_page| {}),
        );
        assert_eq!(client.pending_count(), 1);

        client.reset();
        assert_eq!(client.pending_count(), 0);
        // Nothing pending: returns without touching the network.
        client.run().await;
        assert_eq!(client.statistics().request_count, 0);
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_sentinel() {
        let mut config = Config::for_target("http://127.0.0.1:9/");
        config.http.timeout_ms = 500;
        let client = HttpClient::new(&config).unwrap();

        let page = client
            .fetch(&Url::parse("http://127.0.0.1:9/").unwrap())
            .await;
        assert!(page.is_no_response());
        assert_eq!(client.statistics().request_count, 1);
        assert_eq!(client.statistics().response_count, 0);
    }
}
