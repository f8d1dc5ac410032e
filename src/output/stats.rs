//! Scan progress and statistics
//!
//! Everything here is a pure function of counters gathered by the framework,
//! except [`ScanClock`] which owns the scan's start/finish timestamps.

use crate::audit::HttpStatistics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Percentage of auditable URLs already audited, clamped to `[0, 100]`
///
/// Redirect-only URLs are excluded from the denominator since they can never
/// be audited.
pub fn progress(audited: usize, sitemap: usize, redirects: usize) -> f64 {
    let denominator = sitemap as f64 - redirects as f64;
    if denominator <= 0.0 {
        return if audited > 0 { 100.0 } else { 0.0 };
    }
    (audited as f64 / denominator * 100.0).clamp(0.0, 100.0)
}

/// Responses per second, 0 when nothing has been received yet
pub fn average(responses: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if responses == 0 || secs <= 0.0 {
        return 0.0;
    }
    responses as f64 / secs
}

/// Linear estimate of the time left, `None` until progress is made
pub fn estimate_eta(elapsed: Duration, progress: f64) -> Option<Duration> {
    if progress <= 0.0 || !progress.is_finite() {
        return None;
    }
    if progress >= 100.0 {
        return Some(Duration::ZERO);
    }
    let total = elapsed.as_secs_f64() * 100.0 / progress;
    Some(Duration::from_secs_f64((total - elapsed.as_secs_f64()).max(0.0)))
}

/// Formats a duration as `HH:MM:SS`
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Start/finish timestamps and the cached elapsed time
#[derive(Debug, Clone, Default)]
pub struct ScanClock {
    start: Option<DateTime<Utc>>,
    finish: Option<DateTime<Utc>>,
    delta: Duration,
}

impl ScanClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start = Some(Utc::now());
        self.finish = None;
        self.delta = Duration::ZERO;
    }

    /// Stops the clock; elapsed time is frozen from here on
    pub fn finish(&mut self) {
        let now = Utc::now();
        self.finish = Some(now);
        if let Some(start) = self.start {
            self.delta = (now - start).to_std().unwrap_or_default();
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finish
    }

    pub fn is_finished(&self) -> bool {
        self.finish.is_some()
    }

    /// Elapsed scan time
    ///
    /// The cached value is recomputed only when `override_cache` is set, or
    /// when `refresh` is set and there is still unaudited work. A finished
    /// clock always reports its frozen value.
    pub fn elapsed(
        &mut self,
        refresh: bool,
        override_cache: bool,
        audited: usize,
        sitemap: usize,
    ) -> Duration {
        let Some(start) = self.start else {
            return Duration::ZERO;
        };
        if self.finish.is_some() {
            return self.delta;
        }
        if (refresh && audited != sitemap) || override_cache {
            self.delta = (Utc::now() - start).to_std().unwrap_or_default();
        }
        self.delta
    }

    /// Elapsed time right now, without touching the cache
    pub fn current(&self) -> Duration {
        match (self.start, self.finish) {
            (Some(_), Some(_)) => self.delta,
            (Some(start), None) => (Utc::now() - start).to_std().unwrap_or_default(),
            (None, _) => Duration::ZERO,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Raw inputs to a [`Stats`] snapshot
#[derive(Debug, Clone, Default)]
pub struct StatsInputs {
    pub http: HttpStatistics,
    pub elapsed: Duration,
    pub sitemap_size: usize,
    pub auditmap_size: usize,
    pub redirect_count: usize,
    pub current_page: Option<String>,
    pub url_queue_total_size: u64,
    pub page_queue_total_size: u64,
    pub failures: usize,
}

/// Point-in-time scan statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub requests: u64,
    pub responses: u64,
    pub time_out_count: u64,
    /// Elapsed time as `HH:MM:SS`
    pub time: String,
    pub time_secs: f64,
    /// Responses per second over the whole scan
    pub avg: f64,
    pub sitemap_size: usize,
    pub auditmap_size: usize,
    pub redirect_count: usize,
    pub progress: f64,
    /// Estimated time left as `HH:MM:SS`
    pub eta: Option<String>,
    pub curr_res_time: f64,
    pub curr_res_cnt: u64,
    pub curr_avg: f64,
    pub average_res_time: f64,
    pub max_concurrency: u32,
    pub current_page: Option<String>,
    pub url_queue_total_size: u64,
    pub page_queue_total_size: u64,
    pub failures: usize,
}

impl Stats {
    pub fn compute(inputs: StatsInputs) -> Self {
        let progress = progress(
            inputs.auditmap_size,
            inputs.sitemap_size,
            inputs.redirect_count,
        );

        Self {
            requests: inputs.http.request_count,
            responses: inputs.http.response_count,
            time_out_count: inputs.http.time_out_count,
            time: format_hms(inputs.elapsed),
            time_secs: inputs.elapsed.as_secs_f64(),
            avg: average(inputs.http.response_count, inputs.elapsed),
            sitemap_size: inputs.sitemap_size,
            auditmap_size: inputs.auditmap_size,
            redirect_count: inputs.redirect_count,
            progress,
            eta: estimate_eta(inputs.elapsed, progress).map(format_hms),
            curr_res_time: inputs.http.curr_res_time,
            curr_res_cnt: inputs.http.curr_res_cnt,
            curr_avg: inputs.http.curr_res_per_second,
            average_res_time: inputs.http.average_res_time,
            max_concurrency: inputs.http.max_concurrency,
            current_page: inputs.current_page,
            url_queue_total_size: inputs.url_queue_total_size,
            page_queue_total_size: inputs.page_queue_total_size,
            failures: inputs.failures,
        }
    }
}
