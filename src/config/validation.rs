use crate::config::types::{Config, HttpConfig, RedundantRule, ReportEntry, ScanConfig, SpiderConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scan_config(&config.scan)?;
    validate_user_agent(&config.user_agent.name, &config.user_agent.contact_url)?;
    validate_http_config(&config.http)?;
    validate_spider_config(&config.spider)?;
    validate_redundant_rules(&config.redundant)?;
    validate_reports(&config.reports)?;
    Ok(())
}

/// Validates the target and audit settings
fn validate_scan_config(config: &ScanConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid target url '{}': {}", config.url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Target url '{}' must use http or https",
            config.url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Target url '{}' has no host",
            config.url
        )));
    }

    for path in &config.restrict_paths {
        url.join(path).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid restrict path '{}': {}", path, e))
        })?;
    }

    if config.exclude.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::Validation(
            "exclude patterns cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent identification
fn validate_user_agent(name: &str, contact_url: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "user-agent name must contain only alphanumeric characters and hyphens, got '{}'",
            name
        )));
    }

    Url::parse(contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 200 {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and 200, got {}",
            config.max_concurrency
        )));
    }

    if config.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "timeout-ms must be >= 100ms, got {}ms",
            config.timeout_ms
        )));
    }

    Ok(())
}

fn validate_spider_config(config: &SpiderConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }
    Ok(())
}

fn validate_redundant_rules(rules: &[RedundantRule]) -> Result<(), ConfigError> {
    for rule in rules {
        if rule.pattern.is_empty() {
            return Err(ConfigError::Validation(
                "redundant rule pattern cannot be empty".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_reports(reports: &[ReportEntry]) -> Result<(), ConfigError> {
    for report in reports {
        if report.name.is_empty() {
            return Err(ConfigError::Validation(
                "report name cannot be empty".to_string(),
            ));
        }
        if report.outfile.as_deref() == Some("") {
            return Err(ConfigError::Validation(format!(
                "report '{}' has an empty outfile",
                report.name
            )));
        }
    }
    Ok(())
}
