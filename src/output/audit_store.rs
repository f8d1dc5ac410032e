//! End-of-scan result snapshot

use crate::config::Config;
use crate::modules::{Issue, Severity};
use crate::plugins::PluginResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Build revision recorded in every audit store
pub const REVISION: &str = match option_env!("SUMI_AUDIT_REVISION") {
    Some(rev) => rev,
    None => "unknown",
};

/// Everything a scan produced
///
/// Each call to `Framework::audit_store` builds a fresh, independent value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditStore {
    pub version: String,
    pub revision: String,
    pub config_hash: String,
    /// Scan options as configured, with redundancy budgets unspent
    pub options: Config,
    /// Sorted and de-duplicated
    pub sitemap: Vec<String>,
    pub issues: Vec<Issue>,
    pub plugins: BTreeMap<String, PluginResult>,
    /// URLs abandoned after repeated fetch failures, sorted
    pub failures: Vec<String>,
    pub start_datetime: Option<DateTime<Utc>>,
    pub finish_datetime: Option<DateTime<Utc>>,
    pub delta_time_secs: f64,
}

impl AuditStore {
    /// A store with no results for the given options
    pub fn empty(options: Config) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            revision: REVISION.to_string(),
            config_hash: String::new(),
            options,
            sitemap: Vec::new(),
            issues: Vec::new(),
            plugins: BTreeMap::new(),
            failures: Vec::new(),
            start_datetime: None,
            finish_datetime: None,
            delta_time_secs: 0.0,
        }
    }

    pub fn target(&self) -> &str {
        &self.options.scan.url
    }

    /// Issue counts per severity, including zero counts
    pub fn issue_counts(&self) -> BTreeMap<Severity, usize> {
        let mut counts: BTreeMap<Severity, usize> =
            Severity::all().into_iter().map(|s| (s, 0)).collect();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_insert(0) += 1;
        }
        counts
    }

    /// Issues ordered by severity, most severe first
    pub fn issues_by_severity(&self) -> Vec<&Issue> {
        let mut issues: Vec<&Issue> = self.issues.iter().collect();
        issues.sort_by_key(|i| i.severity);
        issues
    }
}
