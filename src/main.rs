//! Sumi-Audit main entry point
//!
//! This is the command-line interface for the Sumi-Audit scan engine.

use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sumi_audit::audit::{Framework, Platform};
use sumi_audit::config::{load_config_with_hash, Config};
use sumi_audit::output::ReportManager;
use sumi_audit::plugins::ProgressLog;
use sumi_audit::{modules, plugins};
use tracing_subscriber::EnvFilter;

/// Sumi-Audit: web application vulnerability scan engine
///
/// Sumi-Audit crawls a target web application, runs audit modules against
/// every page it finds and writes the findings out as reports.
#[derive(Parser, Debug)]
#[command(name = "sumi-audit")]
#[command(version)]
#[command(about = "Web application vulnerability scan engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(
        value_name = "CONFIG",
        required_unless_present_any = ["list_modules", "list_reports", "list_plugins", "list_platforms"]
    )]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be scanned without scanning
    #[arg(long)]
    dry_run: bool,

    /// List available audit modules and exit
    #[arg(long)]
    list_modules: bool,

    /// List available reports and exit
    #[arg(long)]
    list_reports: bool,

    /// List available plugins and exit
    #[arg(long)]
    list_plugins: bool,

    /// List platforms the fingerprinter can identify and exit
    #[arg(long)]
    list_platforms: bool,

    /// Print the named report to stdout once the scan is done
    #[arg(long, value_name = "NAME")]
    report_as: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if cli.list_modules || cli.list_reports || cli.list_plugins || cli.list_platforms {
        handle_listings(&cli);
        return Ok(());
    }

    let Some(config_path) = cli.config.as_deref() else {
        return Err("a configuration file is required".into());
    };

    tracing::info!("Loading configuration from: {}", config_path.display());
    let (config, config_hash) = match load_config_with_hash(config_path) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, config_path);
        return Ok(());
    }

    handle_scan(config, config_hash, cli.report_as.as_deref()).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_audit=info,warn"),
            1 => EnvFilter::new("sumi_audit=debug,info"),
            2 => EnvFilter::new("sumi_audit=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints the requested component listings
fn handle_listings(cli: &Cli) {
    if cli.list_modules {
        println!("Audit modules:");
        for info in modules::available() {
            println!("  {:<16} [priority {}] {}", info.name, info.priority, info.description);
        }
    }

    if cli.list_reports {
        println!("Reports:");
        for info in ReportManager::new().list() {
            println!(
                "  {:<16} (.{}{}) {}",
                info.name,
                info.extension,
                if info.string_capable { "" } else { ", file only" },
                info.description
            );
        }
    }

    if cli.list_plugins {
        println!("Plugins:");
        for info in plugins::available() {
            println!("  {:<16} {}", info.name, info.description);
        }
    }

    if cli.list_platforms {
        println!("Platforms:");
        for platform in Platform::all() {
            println!("  {:<16} {}", platform.as_str(), platform.description());
        }
    }
}

/// Handles the --dry-run mode: shows what a scan would do
fn handle_dry_run(config: &Config, path: &Path) {
    println!("=== Sumi-Audit Dry Run ===\n");
    println!("Configuration: {}", path.display());

    println!("\nTarget:");
    println!("  URL: {}", config.scan.url);
    println!("  Include subdomains: {}", config.scan.include_subdomains);
    println!("  Only positives: {}", config.scan.only_positives);

    if config.scan.restrict_paths.is_empty() {
        println!(
            "\nSpider: max {} pages, max depth {}",
            config.spider.max_pages, config.spider.max_depth
        );
    } else {
        println!(
            "\nRestricted to {} path(s), spider bypassed:",
            config.scan.restrict_paths.len()
        );
        for path in &config.scan.restrict_paths {
            println!("  - {}", path);
        }
    }

    println!("\nExclude patterns ({}):", config.scan.exclude.len());
    for pattern in &config.scan.exclude {
        println!("  - {}", pattern);
    }

    println!("\nRedundancy rules ({}):", config.redundant.len());
    for rule in &config.redundant {
        println!("  - {} (max {})", rule.pattern, rule.count);
    }

    println!("\nHTTP:");
    println!("  User agent: {}", config.user_agent_string());
    println!("  Timeout: {}ms", config.http.timeout_ms);
    println!("  Max concurrency: {}", config.http.max_concurrency);

    println!("\nModules: {}", join_or_none(&config.scan.modules));
    println!("Plugins: {}", join_or_none(&config.scan.plugins));
    println!("\nReports ({}):", config.reports.len());
    for report in &config.reports {
        match &report.outfile {
            Some(outfile) => println!("  - {} -> {}", report.name, outfile),
            None => println!("  - {}", report.name),
        }
    }

    println!("\n✓ Configuration is valid");
    if config.scan.modules.is_empty() {
        println!("! No modules configured: the scan will only crawl");
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

/// Handles the main scan operation
async fn handle_scan(
    config: Config,
    config_hash: String,
    report_as: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Scanning {}", config.scan.url);
    tracing::info!(
        "Modules: {}, Plugins: {}, Reports: {}",
        config.scan.modules.len(),
        config.scan.plugins.len(),
        config.reports.len()
    );

    let mut framework = Framework::new(config)?;
    framework.set_config_hash(config_hash);

    // Progress is logged from a plugin task through the framework handle.
    framework
        .plugins_mut()
        .register(Arc::new(ProgressLog::default()));

    let outcome = framework.run().await;

    if let Err(e) = outcome {
        tracing::error!("Scan failed: {}", e);
        return Err(e.into());
    }

    let store = framework.audit_store();
    let counts = store.issue_counts();
    tracing::info!(
        "Scan completed: {} page(s) in sitemap, {} issue(s), {} failure(s)",
        store.sitemap.len(),
        store.issues.len(),
        store.failures.len()
    );
    for (severity, count) in counts {
        tracing::info!("  {}: {}", severity, count);
    }

    if let Some(name) = report_as {
        let bytes = framework.report_as(name, &store)?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&bytes)?;
        stdout.flush()?;
    }

    Ok(())
}
