//! threadcrawl CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use threadcrawl::{
    error::Result,
    models::{Config, CrawlPlan, suggest_step},
    pipeline::{self, CrawlState, CrawlSummary, Crawler, LineApprover},
    services::RedditClient,
    storage::LocalStorage,
};
use tokio::io::BufReader;

/// threadcrawl - Resumable discussion thread crawler
#[derive(Parser, Debug)]
#[command(
    name = "threadcrawl",
    version,
    about = "Resumable crawler that flattens discussion threads into JSONL"
)]
struct Cli {
    /// Path to storage directory containing config and crawl state
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every category and term without prompting
    Crawl {
        #[command(flatten)]
        plan: PlanOverrides,
    },

    /// Crawl with manual approval of each batch of threads
    Review {
        #[command(flatten)]
        plan: PlanOverrides,
    },

    /// Remove a category's records and unmark its threads
    Retract {
        /// Category whose stream is removed
        category: String,
    },

    /// Show counters, visited-set size and stream sizes
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate,
}

/// Command line overrides for the crawl plan.
#[derive(Args, Debug)]
struct PlanOverrides {
    /// Only crawl these categories (repeatable)
    #[arg(short, long = "category")]
    categories: Vec<String>,

    /// Stop once this many records exist (with --target-words)
    #[arg(long)]
    target_records: Option<u64>,

    /// Stop once this many words exist (with --target-records)
    #[arg(long)]
    target_words: Option<u64>,

    /// Ignore both targets and walk the whole matrix
    #[arg(long, conflicts_with_all = ["target_records", "target_words"])]
    no_targets: bool,

    /// Minimum reply count for a thread to be fetched
    #[arg(long)]
    min_activity: Option<u64>,
}

impl PlanOverrides {
    fn apply(self, plan: &mut CrawlPlan) {
        if !self.categories.is_empty() {
            plan.categories = self.categories;
        }
        if let Some(records) = self.target_records {
            plan.target_records = Some(records);
        }
        if let Some(words) = self.target_words {
            plan.target_words = Some(words);
        }
        if self.no_targets {
            plan.target_records = None;
            plan.target_words = None;
        }
        if let Some(min) = self.min_activity {
            plan.min_activity = min;
        }
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn log_summary(summary: &CrawlSummary) {
    log::info!(
        "Run: {} threads fetched, {} failed, {} filtered, {} declined",
        summary.threads_fetched,
        summary.threads_failed,
        summary.threads_filtered,
        summary.threads_declined
    );
    log::info!(
        "Run: +{} records, +{} words, {} failed searches, {} discarded batches",
        summary.records_written,
        summary.words_written,
        summary.searches_failed,
        summary.batches_discarded
    );
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let mut config = Config::load_or_default(&config_path)?;

    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    let storage = LocalStorage::with_paths(&cli.storage_dir, config.paths.clone());

    match cli.command {
        Command::Crawl { plan } => {
            plan.apply(&mut config.crawl);
            config.validate()?;
            let client = RedditClient::from_config(&config.crawler)?;
            let mut state = CrawlState::load(&storage).await?;

            let summary = Crawler::new(&client, &storage, &config.crawl)
                .run(&mut state)
                .await?;
            log_summary(&summary);
            log::info!("Crawl complete!");
        }

        Command::Review { plan } => {
            plan.apply(&mut config.crawl);
            config.validate()?;
            let client = RedditClient::from_config(&config.crawler)?;
            let mut state = CrawlState::load(&storage).await?;

            let mut approver =
                LineApprover::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());
            let hint = |title: &str| suggest_step(&config.hints, title).to_string();

            let summary = Crawler::new(&client, &storage, &config.crawl)
                .run_reviewed(&mut state, &mut approver, &hint)
                .await?;
            log_summary(&summary);
            log::info!("Reviewed crawl complete!");
        }

        Command::Retract { category } => {
            let summary = pipeline::retract_category(&storage, &category).await?;
            log::info!(
                "Removed {} records; {} of {} threads unmarked; {} completed terms cleared",
                summary.records,
                summary.unvisited,
                summary.threads,
                summary.completed_terms_cleared
            );
        }

        Command::Status { json } => {
            let status = pipeline::collect_status(&storage, &config.crawl.categories).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                log::info!("Storage directory: {}", cli.storage_dir.display());
                log::info!(
                    "Totals: {} records, {} words",
                    status.total_records,
                    status.total_words
                );
                log::info!("Completed terms: {}", status.completed_terms);
                log::info!("Visited threads: {}", status.visited);
                for stream in &status.streams {
                    match stream.bytes {
                        Some(bytes) => log::info!(
                            "  {}: {} records, {} bytes, {} corrupt lines",
                            stream.category,
                            stream.records,
                            bytes,
                            stream.corrupt_lines
                        ),
                        None => log::info!("  {}: no stream yet", stream.category),
                    }
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} categories, {} terms)",
                config.crawl.categories.len(),
                config.crawl.terms.len()
            );
        }
    }

    Ok(())
}
