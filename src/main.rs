//! Paper-Harvest main entry point
//!
//! This is the command-line interface for the Paper-Harvest crawler and annotator.

use anyhow::Context;
use clap::Parser;
use paper_harvest::annotate::{run_annotation, GeminiClassifier};
use paper_harvest::config::{load_config_with_hash, Config};
use paper_harvest::crawler::Coordinator;
use paper_harvest::output::{load_statistics, print_statistics};
use paper_harvest::storage::open_storage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Paper-Harvest: an academic paper crawler
///
/// Paper-Harvest walks a conference proceedings site from its index page,
/// follows the configured years down to each paper's detail page, downloads
/// the paper, and records it in SQLite. A separate pass labels downloaded
/// papers with a topic category.
#[derive(Parser, Debug)]
#[command(name = "paper-harvest")]
#[command(version)]
#[command(about = "An academic paper crawler and annotator", long_about = None)]
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
    #[arg(long, conflicts_with_all = ["stats", "annotate"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "annotate"])]
    stats: bool,

    /// Label downloaded papers with a topic category and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    annotate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.annotate {
        handle_annotate(&config).await?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("paper_harvest=info,warn"),
            1 => EnvFilter::new("paper_harvest=debug,info"),
            2 => EnvFilter::new("paper_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Paper-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Root URL: {}", config.crawler.root_url);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    println!("  Year filter: {}", config.crawler.year_filter.join(", "));
    println!("  Year match: {:?}", config.crawler.year_match);
    println!(
        "  Artifact extensions: {}",
        config.crawler.artifact_extensions.join(", ")
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Accept invalid certs: {}", config.crawler.accept_invalid_certs);
    println!("  User agent: {}", config.crawler.user_agent);
    println!(
        "  Infer year from index: {}",
        config.crawler.infer_year_from_index
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Download folder: {}", config.output.download_folder);

    println!("\nAnnotator:");
    println!("  Endpoint: {}", config.annotator.endpoint);
    println!("  Model: {}", config.annotator.model);
    println!("  API key variable: {}", config.annotator.api_key_env);
    println!("  Max retries: {}", config.annotator.max_retries);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl {} for years {}",
        config.crawler.root_url,
        config.crawler.year_filter.join(", ")
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open the paper database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --annotate mode: labels unprocessed papers
async fn handle_annotate(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open the paper database")?;
    let classifier = GeminiClassifier::from_env(&config.annotator)?;

    let report = run_annotation(&mut storage, &classifier).await?;
    println!("{}", report);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open the paper database")?;
    let coordinator = Coordinator::new(config, storage)?.with_config_hash(config_hash);

    // Ctrl-C stops new branches; in-flight downloads finish
    let stop = coordinator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight branches");
            stop.request_stop();
        }
    });

    match coordinator.run().await {
        Ok(report) => {
            println!("{}", report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
