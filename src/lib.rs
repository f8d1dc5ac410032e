//! Sumi-Audit: scan orchestration core for a web-application security scanner
//!
//! This crate sequences a scan end to end: it drives a crawl, turns discovered
//! URLs into fetched pages, runs audit modules against every page, feeds
//! newly discovered pages back into the pipeline and assembles the results
//! into an [`output::AuditStore`]. Scans can be paused, resumed and inspected
//! from another task through a [`audit::FrameworkHandle`].

pub mod audit;
pub mod config;
pub mod crawler;
pub mod modules;
pub mod output;
pub mod plugins;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Audit operations
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid scan transition: {from} -> {to}")]
    InvalidTransition {
        from: state::ScanStatus,
        to: state::ScanStatus,
    },

    #[error("Report error: {0}")]
    Report(#[from] output::ReportError),

    #[error("Module error: {0}")]
    Module(#[from] modules::ModuleError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] plugins::PluginError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Spider error: {0}")]
    Spider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Sumi-Audit operations
pub type Result<T> = std::result::Result<T, AuditError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use audit::{Framework, FrameworkHandle, Page};
pub use config::Config;
pub use output::{AuditStore, Stats};
pub use state::ScanStatus;
