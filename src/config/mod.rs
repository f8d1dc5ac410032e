//! Configuration module for Sumi-Audit
//!
//! This module handles loading, parsing, and validating TOML scan configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_audit::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scan.toml")).unwrap();
//! println!("Scanning: {}", config.scan.url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, HttpConfig, RedundantRule, ReportEntry, ScanConfig, SpiderConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, hash_config, load_config, load_config_with_hash, parse_config,
};
pub use validation::validate;

impl Config {
    /// Builds a minimal configuration for the given target URL
    ///
    /// Useful for embedding the framework without a config file.
    pub fn for_target(url: &str) -> Self {
        Config {
            scan: ScanConfig {
                url: url.to_string(),
                restrict_paths: vec![],
                exclude: vec![],
                include_subdomains: false,
                only_positives: false,
                modules: vec![],
                plugins: vec![],
            },
            user_agent: UserAgentConfig {
                name: "SumiAudit".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                contact_url: "https://example.com/about".to_string(),
            },
            http: HttpConfig::default(),
            spider: SpiderConfig::default(),
            redundant: vec![],
            reports: vec![],
        }
    }

    /// Formats the User-Agent header value
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.user_agent.name, self.user_agent.version, self.user_agent.contact_url
        )
    }
}
