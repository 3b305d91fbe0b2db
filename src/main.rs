//! Catalog-Trawler main entry point
//!
//! This is the command-line interface for the Catalog-Trawler catalog crawler.

use anyhow::Context;
use catalog_trawler::checkpoint::Checkpoint;
use catalog_trawler::config::{load_config_with_hash, Config};
use catalog_trawler::crawler::{RunOptions, Trawler, DETAIL_STAGE, LISTING_STAGE};
use catalog_trawler::dispatch::SearchTemplate;
use catalog_trawler::output::{print_summary, print_unit_progress, StageSummary};
use catalog_trawler::state::{DetailState, ListingState};
use catalog_trawler::AddressTaxonomy;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Catalog-Trawler: a patient, restart-safe catalog crawler
///
/// Catalog-Trawler searches a catalog once per configured area, enriches every
/// listed record from its detail page and resolves its address against the
/// configured areas. Progress is checkpointed after every page and record, so an
/// interrupted run simply resumes.
#[derive(Parser, Debug)]
#[command(name = "catalog-trawler")]
#[command(version)]
#[command(about = "A patient, restart-safe catalog crawler", long_about = None)]
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

    /// Stages to run
    #[arg(long, value_enum, default_value_t = StageArg::All)]
    stage: StageArg,

    /// Start the selected stages over, ignoring their snapshots
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without fetching anything
    #[arg(long, conflicts_with = "inspect")]
    dry_run: bool,

    /// Show per-unit progress from the snapshots and exit
    #[arg(long, conflicts_with = "dry_run")]
    inspect: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum StageArg {
    Listing,
    Detail,
    All,
}

impl StageArg {
    fn run_options(self, fresh: bool) -> RunOptions {
        RunOptions {
            listing: matches!(self, Self::Listing | Self::All),
            detail: matches!(self, Self::Detail | Self::All),
            fresh,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).context("invalid configuration");
        }
    };
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.inspect {
        handle_inspect(&config)
    } else {
        handle_crawl(config, cli.stage.run_options(cli.fresh)).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_trawler=info,warn"),
            1 => EnvFilter::new("catalog_trawler=debug,info"),
            2 => EnvFilter::new("catalog_trawler=trace,debug"),
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

/// Handles the --dry-run mode: shows the units and their first search page
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let taxonomy = AddressTaxonomy::from_config(&config.areas)?;
    let search = SearchTemplate::from_config(&config.search)?;

    println!("=== Catalog-Trawler Dry Run ===\n");

    println!("Dispatcher:");
    println!("  Minimum interval: {}ms", config.dispatcher.min_interval_ms);
    println!(
        "  Backoff: {}ms up to {}ms",
        config.dispatcher.min_sleep_ms, config.dispatcher.max_sleep_ms
    );
    println!("  Block markers: {:?}", config.dispatcher.block_markers);
    println!("  User agents: {}", config.dispatcher.user_agents.len());

    println!("\nSnapshots:");
    println!("  Listing: {}", config.checkpoint.listing_path().display());
    println!("  Detail: {}", config.checkpoint.detail_path().display());

    let leaves = taxonomy.leaves();
    println!("\nUnits ({}):", leaves.len());
    for leaf in &leaves {
        let first_page = search
            .url_for(leaf.match_key(), 1)
            .map(|url| url.to_string())
            .unwrap_or_default();
        println!("  - {}", taxonomy.path_of(leaf.id()).join(" > "));
        println!("    {}", first_page);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} units", leaves.len());

    Ok(())
}

/// Handles the --inspect mode: shows snapshot progress without fetching
fn handle_inspect(config: &Config) -> anyhow::Result<()> {
    let taxonomy = AddressTaxonomy::from_config(&config.areas)?;
    let fingerprint = taxonomy.fingerprint();

    let listing: Checkpoint<ListingState> =
        Checkpoint::load(config.checkpoint.listing_path(), LISTING_STAGE, &fingerprint)?;
    let details: Checkpoint<DetailState> =
        Checkpoint::load(config.checkpoint.detail_path(), DETAIL_STAGE, &fingerprint)?;

    print_summary(&StageSummary::from_state(
        LISTING_STAGE,
        &taxonomy,
        listing.state(),
    ));
    print_unit_progress(LISTING_STAGE, &taxonomy, listing.state());

    print_summary(
        &StageSummary::from_state(DETAIL_STAGE, &taxonomy, details.state())
            .with_resolution(details.state()),
    );
    print_unit_progress(DETAIL_STAGE, &taxonomy, details.state());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, options: RunOptions) -> anyhow::Result<()> {
    if options.fresh {
        tracing::info!("Starting fresh crawl (ignoring previous snapshots)");
    } else {
        tracing::info!("Starting crawl (will resume from snapshots if present)");
    }
    tracing::info!("Areas: {}", config.areas.len());

    let mut trawler = Trawler::from_config(config)?;
    tracing::info!("Units to crawl: {}", trawler.taxonomy().leaves().len());

    match trawler.run(options).await {
        Ok(summaries) => {
            for summary in &summaries {
                print_summary(summary);
            }
            tracing::info!("Crawl completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            tracing::error!("Snapshots are intact; run again to resume");
            Err(e.into())
        }
    }
}
