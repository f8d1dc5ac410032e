use serde::{Deserialize, Serialize};

/// Main configuration structure for a scan
///
/// The whole structure is cloned into every [`crate::output::AuditStore`],
/// so it must stay serializable and comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub scan: ScanConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub spider: SpiderConfig,
    #[serde(default)]
    pub redundant: Vec<RedundantRule>,
    #[serde(default, rename = "report")]
    pub reports: Vec<ReportEntry>,
}

/// Target and audit behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Root URL of the web application under test
    pub url: String,

    /// When non-empty, these paths form the entire sitemap and the spider is bypassed
    #[serde(rename = "restrict-paths", default)]
    pub restrict_paths: Vec<String>,

    /// Substring patterns; matching URLs are never queued or audited
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Whether subdomains of the target host are in scope
    #[serde(rename = "include-subdomains", default)]
    pub include_subdomains: bool,

    /// Only report verified findings while the scan is running
    #[serde(rename = "only-positives", default)]
    pub only_positives: bool,

    /// Audit modules to load, by name
    #[serde(default)]
    pub modules: Vec<String>,

    /// Plugins to load, by name
    #[serde(default)]
    pub plugins: Vec<String>,
}

/// Identification sent with every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAgentConfig {
    pub name: String,

    pub version: String,

    /// URL with information about the scanner operator
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

/// HTTP transport tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of queued requests in flight at once
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_concurrency() -> u32 {
    20
}

/// Built-in spider limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiderConfig {
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_pages() -> u32 {
    500
}

fn default_max_depth() -> u32 {
    5
}

/// Limits how many URLs matching `pattern` are accepted into the scan
///
/// `count` is consumed as matching URLs are queued; the framework keeps a
/// pristine copy so reports show the configured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedundantRule {
    pub pattern: String,
    pub count: u32,
}

/// A report to generate once the scan is done
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,

    /// Destination file; reports pick a default name when omitted
    #[serde(default)]
    pub outfile: Option<String>,
}
