//! Built-in plugin that periodically logs scan progress

use super::{Plugin, PluginContext, PluginError, PluginInfo};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

const POLL: Duration = Duration::from_millis(100);

pub struct ProgressLog {
    interval: Duration,
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl ProgressLog {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl Plugin for ProgressLog {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: "progress_log".to_string(),
            description: "Logs scan progress at a fixed interval".to_string(),
        }
    }

    async fn run(&self, ctx: PluginContext) -> Result<Value, PluginError> {
        let mut samples = 0u64;
        let mut peak_concurrency = 0u32;
        let mut last = Instant::now();

        while ctx.handle.is_running() {
            tokio::time::sleep(POLL).await;
            if last.elapsed() < self.interval {
                continue;
            }
            last = Instant::now();

            let stats = ctx.handle.stats(true, false);
            samples += 1;
            peak_concurrency = peak_concurrency.max(stats.max_concurrency);
            tracing::info!(
                "[{}] {:.1}% audited ({}/{} pages), {} requests, ETA {}",
                ctx.handle.status(),
                stats.progress,
                stats.auditmap_size,
                stats.sitemap_size,
                stats.requests,
                stats.eta.as_deref().unwrap_or("--:--:--")
            );
        }

        let stats = ctx.handle.stats(false, false);
        Ok(json!({
            "samples": samples,
            "final_progress": stats.progress,
            "peak_concurrency": peak_concurrency,
            "elapsed": stats.time,
        }))
    }
}
