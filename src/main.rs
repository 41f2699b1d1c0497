use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;

mod config;
mod error;
mod fetch;
mod logging;
mod stats;
mod tcg;
mod utils;

use config::FetchConfig;
use error::{Error, Result};
use fetch::Fetcher;
use stats::RunStats;
use tcg::catalog::CatalogClient;
use tcg::CardSet;

/// Fetch Pokémon TCG Pocket card images into a per-language, per-set tree
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// Series to fetch, comma-separated
    #[arg(short, long, default_value = "a,b")]
    series: String,

    /// Catalog API endpoint
    #[arg(long, default_value = config::DEFAULT_CATALOG_URL)]
    catalog_url: String,

    /// Primary image host
    #[arg(long, default_value = config::DEFAULT_IMAGE_HOST)]
    image_host: String,

    /// Fallback image host (English webp)
    #[arg(long, default_value = config::DEFAULT_FALLBACK_HOST)]
    fallback_host: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download card images for the selected series and languages
    Fetch {
        #[command(flatten)]
        source: SourceArgs,

        /// Base directory; images go under <base-dir>/images
        #[arg(short, long, default_value = ".")]
        base_dir: String,

        /// Languages to fetch, comma-separated
        #[arg(short, long, default_value = "zh-TW,en-US")]
        langs: String,

        /// Maximum number of requests in flight at once
        #[arg(short, long, default_value_t = 20)]
        concurrency: usize,

        /// Total attempts per primary image on transient errors
        #[arg(long, default_value_t = 3)]
        max_retries: u32,
    },
    /// List the catalog's sets without downloading anything
    Sets {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init(args.verbose) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    tokio::select! {
        result = dispatch(args.command) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("\nError: {}", e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n\nInterrupted, exiting...");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Fetch {
            source,
            base_dir,
            langs,
            concurrency,
            max_retries,
        } => {
            let mut config =
                FetchConfig::new(base_dir, &source.series, &langs, concurrency, max_retries)?;
            apply_source(&mut config, source);
            run_fetch(config).await
        }
        Commands::Sets { source } => {
            let mut config = FetchConfig::new(".", &source.series, "en-US", 1, 1)?;
            apply_source(&mut config, source);
            list_sets(&config).await
        }
    }
}

fn apply_source(config: &mut FetchConfig, source: SourceArgs) {
    config.endpoints.catalog_url = source.catalog_url;
    config.endpoints.image_host = source.image_host.trim_end_matches('/').to_string();
    config.endpoints.fallback_host = source.fallback_host.trim_end_matches('/').to_string();
}

async fn fetch_all_sets(client: &reqwest::Client, config: &FetchConfig) -> Vec<CardSet> {
    let catalog = CatalogClient::new(client, &config.endpoints, &config.timeouts);
    let mut all_sets = Vec::new();
    for series in &config.series {
        let sets = catalog.fetch_sets(series).await;
        println!("Series {}: found {} sets", series, sets.len());
        all_sets.extend(sets);
    }
    all_sets
}

async fn run_fetch(config: FetchConfig) -> Result<()> {
    println!("Base directory: {}", config.base_dir.display());
    println!("Languages: {}", config.languages.join(", "));
    println!("Series: {}", config.series.join(", "));
    println!("Concurrency: {}", config.concurrency);
    println!();

    utils::files::ensure_directories(&config.base_dir)
        .map_err(|e| Error::fs(utils::files::images_root(&config.base_dir), e))?;
    let swept = utils::files::sweep_partial_files(&config.base_dir)
        .map_err(|e| Error::fs(utils::files::images_root(&config.base_dir), e))?;
    if swept > 0 {
        tracing::info!(removed = swept, "Removed partial files from an interrupted run");
    }

    let client = utils::http::build_client(&config.timeouts)?;
    let sets = fetch::dedup_sets(fetch_all_sets(&client, &config).await);
    if sets.is_empty() {
        println!("No card sets found");
        return Ok(());
    }

    let total = fetch::estimate_total(&sets, &config.languages);
    println!("\n{} sets to process", sets.len());
    println!("About {} images to check (probe sets estimated)\n", total);

    let pb = fetch::progress_bar(total);
    let fetcher = Arc::new(Fetcher::new(
        &config,
        client,
        Arc::new(RunStats::new()),
        pb.clone(),
    ));

    fetcher.run(&sets, &config.languages).await;
    pb.finish_with_message("Download complete!");

    println!("\n{}", fetcher.stats().render_report(fetcher.limiter().peak()));

    match utils::files::count_set_directories(&config.base_dir, &config.languages) {
        Ok(counts) => {
            for (language, count) in counts {
                println!("Set directories for {}: {}", language, count);
            }
        }
        Err(e) => eprintln!("Error counting set directories: {}", e),
    }

    Ok(())
}

async fn list_sets(config: &FetchConfig) -> Result<()> {
    let client = utils::http::build_client(&config.timeouts)?;
    for set in fetch_all_sets(&client, config).await {
        let size = if set.is_size_unknown() {
            "probe".to_string()
        } else {
            set.total_cards.to_string()
        };
        println!("  [{}] {:<10} id={:<6} cards={}", set.series, set.set_code, set.id, size);
    }
    Ok(())
}
