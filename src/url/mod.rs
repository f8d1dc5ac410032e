//! URL handling module for Sumi-Audit
//!
//! This module provides URL normalization, wildcard host matching and the
//! scope rules that decide which URLs a scan may queue or audit.

mod matcher;
mod normalize;

use crate::config::{Config, RedundantRule};
use crate::UrlError;
use url::Url;

// Re-export main functions
pub use matcher::{matches_any_pattern, matches_wildcard};
pub use normalize::{normalize_url, resolve_url};

/// Extracts the lowercase host from a URL
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Immutable scope filter shared between the scan driver and its handles
///
/// A URL is excluded when it points off the target host (subdomains are
/// allowed only when configured) or matches one of the exclude patterns.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    target: Url,
    target_host: String,
    include_subdomains: bool,
    patterns: Vec<String>,
}

impl ExclusionPolicy {
    /// Builds the policy from the scan configuration
    pub fn from_config(config: &Config) -> Result<Self, UrlError> {
        let target = normalize_url(&config.scan.url)?;
        let target_host = extract_host(&target).ok_or(UrlError::MissingHost)?;

        Ok(Self {
            target,
            target_host,
            include_subdomains: config.scan.include_subdomains,
            patterns: config.scan.exclude.clone(),
        })
    }

    /// The normalized scan target, used as base for relative URLs
    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Resolves a possibly relative URL against the scan target
    pub fn resolve(&self, input: &str) -> Result<Url, UrlError> {
        resolve_url(&self.target, input)
    }

    /// Returns true if the URL must not enter the scan
    pub fn is_excluded(&self, url: &Url) -> bool {
        !self.in_domain(url) || matches_any_pattern(&self.patterns, url.as_str())
    }

    fn in_domain(&self, url: &Url) -> bool {
        let Some(host) = extract_host(url) else {
            return false;
        };

        if self.include_subdomains {
            matches_wildcard(&format!("*.{}", self.target_host), &host)
        } else {
            host == self.target_host
        }
    }
}

/// Per-pattern budgets for redundant URLs (calendars, paginated archives)
///
/// Every accepted URL matching a rule consumes one unit of that rule's
/// budget; once a budget reaches zero, further matches are rejected.
#[derive(Debug, Clone, Default)]
pub struct RedundancyBudget {
    rules: Vec<RedundantRule>,
}

impl RedundancyBudget {
    pub fn new(rules: Vec<RedundantRule>) -> Self {
        Self { rules }
    }

    /// Returns false without consuming anything if a matching rule is exhausted
    pub fn consume(&mut self, url: &Url) -> bool {
        let haystack = url.as_str().to_lowercase();
        let matching: Vec<usize> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| haystack.contains(&rule.pattern.to_lowercase()))
            .map(|(i, _)| i)
            .collect();

        if matching.iter().any(|&i| self.rules[i].count == 0) {
            tracing::debug!("Redundancy budget exhausted for {}", url);
            return false;
        }

        for i in matching {
            self.rules[i].count -= 1;
        }
        true
    }

    /// Current (partially consumed) rules
    pub fn rules(&self) -> &[RedundantRule] {
        &self.rules
    }
}
