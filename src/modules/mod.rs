//! Audit modules and their shared result types
//!
//! # Components
//!
//! - `Module`: the contract every audit check implements
//! - `ModuleRegistry`: loaded modules, scheduling order and scan-wide findings
//! - `HeaderDisclosure`: built-in passive check for leaky response headers

mod headers;
mod registry;

pub use headers::HeaderDisclosure;
pub use registry::{ModuleContext, ModuleRegistry};

use crate::audit::Page;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised by or about audit modules
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Module failed: {0}")]
    Failed(String),

    #[error("Module panicked: {0}")]
    Panicked(String),
}

/// Descriptive metadata for a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub description: String,
    /// Lower runs earlier
    pub priority: u32,
}

/// An audit check run against every page
#[async_trait]
pub trait Module: Send + Sync {
    fn info(&self) -> ModuleInfo;

    /// Audits a page, reporting findings through `ctx`
    async fn run(&self, page: &Page, ctx: &ModuleContext) -> Result<(), ModuleError>;
}

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Informational,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Informational => "informational",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "informational" => Some(Self::Informational),
            _ => None,
        }
    }

    pub fn all() -> [Self; 5] {
        [
            Self::Critical,
            Self::High,
            Self::Medium,
            Self::Low,
            Self::Informational,
        ]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A finding logged by a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub name: String,
    pub module: String,
    pub url: String,
    pub severity: Severity,
    pub description: String,
    pub remarks: Vec<String>,
    pub verified: bool,
}

impl Issue {
    pub fn new(
        name: impl Into<String>,
        module: impl Into<String>,
        url: &Url,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            url: url.as_str().to_string(),
            severity,
            description: description.into(),
            remarks: Vec::new(),
            verified: false,
        }
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remarks.push(remark.into());
        self
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }
}

/// A provisional time-based finding awaiting latency verification
#[derive(Debug, Clone)]
pub struct TimeoutCandidate {
    pub module: String,
    pub issue: Issue,
    /// URL carrying the delaying payload
    pub url: Url,
    /// URL of the unmodified page, fetched as the baseline
    pub control: Url,
    /// Minimum latency the probe must exhibit
    pub delay: Duration,
}

/// Instantiates a built-in module by name
pub fn builtin(name: &str) -> Option<std::sync::Arc<dyn Module>> {
    match name {
        "headers" => Some(std::sync::Arc::new(HeaderDisclosure)),
        _ => None,
    }
}

/// Metadata for every built-in module
pub fn available() -> Vec<ModuleInfo> {
    vec![HeaderDisclosure.info()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert!(builtin("headers").is_some());
        assert!(builtin("xss").is_none());
    }

    #[test]
    fn test_issue_builder() {
        let url = Url::parse("https://example.com/").unwrap();
        let issue = Issue::new("Leak", "headers", &url, Severity::Low, "desc")
            .with_remark("seen twice")
            .verified();

        assert_eq!(issue.url, "https://example.com/");
        assert_eq!(issue.remarks, vec!["seen twice"]);
        assert!(issue.verified);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical < Severity::Informational);
        assert_eq!(Severity::Medium.to_string(), "medium");
    }
}
