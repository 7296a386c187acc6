//! Sumi-Crawl main entry point
//!
//! This is the command-line interface for the Sumi-Crawl concurrent crawler.

use clap::Parser;
use std::path::PathBuf;
use sumi_crawl::config::{load_config_with_hash, Config};
use sumi_crawl::crawler::crawl;
use sumi_crawl::output::print_report;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sumi-Crawl: a concurrent web crawler
///
/// Sumi-Crawl starts from seed URLs and follows links with a fixed pool of
/// workers, capping parallel requests per domain and stopping once every
/// reachable page within the configured depth has been fetched.
/// Press Ctrl-C to cancel; in-flight fetches finish before the report is printed.
#[derive(Parser, Debug)]
#[command(name = "sumi-crawl")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_crawl=info,warn"),
            1 => EnvFilter::new("sumi_crawl=debug,info"),
            2 => EnvFilter::new("sumi_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Crawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.workers);
    println!(
        "  Per-domain parallelism: {}",
        config.crawler.per_domain_parallelism
    );
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout_ms);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nSeeds ({}):", config.scope.seeds.len());
    for seed in &config.scope.seeds {
        println!("  * {}", seed);
    }

    if config.scope.allowed_domains.is_empty() {
        println!("\nAllowed Domains: all");
    } else {
        println!("\nAllowed Domains ({}):", config.scope.allowed_domains.len());
        for pattern in &config.scope.allowed_domains {
            println!("  - {}", pattern);
        }
    }

    println!("\nBlocked Domains ({}):", config.scope.blocked_domains.len());
    for pattern in &config.scope.blocked_domains {
        println!("  - {}", pattern);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Starting crawl: {} seeds, {} workers, max depth {}",
        config.scope.seeds.len(),
        config.crawler.workers,
        config.crawler.max_depth
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight fetches");
                cancel.cancel();
            }
        });
    }

    match crawl(config, cancel).await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
