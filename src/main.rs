//! Fedi-Ripple main entry point
//!
//! This is the command-line interface for the Fedi-Ripple graph scanner.

use anyhow::Context;
use clap::Parser;
use fedi_ripple::config::{load_config_with_hash, Config};
use fedi_ripple::output::{load_statistics, print_statistics};
use fedi_ripple::scanner::run_scan;
use fedi_ripple::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Fedi-Ripple: a polite federated social-graph explorer
///
/// Fedi-Ripple scans the follower and following lists of accounts on
/// Mastodon-compatible instances and records every account and instance
/// it discovers, one worker per configured instance.
#[derive(Parser, Debug)]
#[command(name = "fedi-ripple")]
#[command(version = "1.0.0")]
#[command(about = "A polite federated social-graph explorer", long_about = None)]
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

    /// Validate config and show what would be scanned without scanning
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_scan(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("fedi_ripple=info,warn"),
            1 => EnvFilter::new("fedi_ripple=debug,info"),
            2 => EnvFilter::new("fedi_ripple=trace,debug"),
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

/// Handles the --dry-run mode: shows what would be scanned
fn handle_dry_run(config: &Config) {
    println!("=== Fedi-Ripple Dry Run ===\n");

    println!("Scanner Configuration:");
    println!("  Cycle interval: {}s", config.scanner.cycle_interval_secs);
    println!("  Transient pause: {}ms", config.scanner.transient_pause_ms);
    println!("  Rescan after: {}s", config.scanner.rescan_after_secs);
    println!("  Batch size: {}", config.scanner.batch_size);
    println!(
        "  Paging: {} accounts x {} page(s)",
        config.scanner.page_limit, config.scanner.max_pages
    );
    println!("  Failure policy: {:?}", config.scanner.failure_policy);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nInstances ({}):", config.instances.len());
    for entry in &config.instances {
        println!(
            "  - {} as {} ({} seeds)",
            entry.domain,
            entry.username,
            entry.seeds.len()
        );
        for seed in &entry.seeds {
            println!("    * {}", seed);
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start {} worker(s) with {} seed accounts",
        config.instances.len(),
        config.instances.iter().map(|i| i.seeds.len()).sum::<usize>()
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("failed to open the database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main scan; runs until interrupted
async fn handle_scan(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Scanning {} instance(s) every {}s",
        config.instances.len(),
        config.scanner.cycle_interval_secs
    );

    tokio::select! {
        result = run_scan(config) => {
            result.context("scan failed")?;
            tracing::info!("All workers stopped");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            tracing::info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
