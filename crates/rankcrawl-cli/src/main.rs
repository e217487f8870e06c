mod pipeline;

use clap::{Parser, Subcommand};
use rankcrawl_db::PgStore;
use rankcrawl_scraper::HttpFetcher;
use tracing_subscriber::EnvFilter;

use crate::pipeline::{Pipeline, PipelineError};

#[derive(Debug, Parser)]
#[command(name = "rankcrawl")]
#[command(about = "Crawl a paginated ranking listing into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Plan, crawl, merge, and load (the default when no command is given)
    Run {
        /// Stop after staging; skip merge and load
        #[arg(long)]
        dry_run: bool,
    },
    /// Fetch the probe page and print the planned offsets
    Plan,
    /// Fetch and stage every page without merging
    Crawl,
    /// Merge all staged fragments into a new canonical dataset
    Merge,
    /// Load the newest canonical dataset without re-crawling
    Load,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = rankcrawl_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let fetcher = HttpFetcher::new(
        config.request_timeout_secs,
        &config.user_agent,
        &config.locale,
        config.max_retries,
        config.retry_backoff_ms,
    )?;
    let pipeline = Pipeline::new(fetcher, config);

    match cli.command.unwrap_or(Commands::Run { dry_run: false }) {
        Commands::Run { dry_run: true } => {
            let state = pipeline.plan().await.map_err(fail)?;
            let crawl = pipeline.crawl(&state).await.map_err(fail)?;
            println!(
                "dry-run: staged {} records from {} pages into {} fragments; merge and load skipped",
                crawl.records,
                crawl.pages,
                crawl.fragments.len()
            );
        }
        Commands::Run { dry_run: false } => {
            let database_url = pipeline.config().require_database_url()?.to_owned();
            let summary = pipeline.run(&PgStore, &database_url).await.map_err(fail)?;
            println!(
                "loaded {} records ({} pages of {}) from {} into {}.{}",
                summary.dataset.record_count,
                summary.crawl.pages,
                summary.state.total_count,
                summary.dataset.path.display(),
                summary.load.database,
                summary.load.table
            );
        }
        Commands::Plan => {
            let state = pipeline.plan().await.map_err(fail)?;
            let offsets: Vec<String> = state.offsets().map(|o| o.to_string()).collect();
            println!(
                "total {} in pages of {}: offsets [{}]",
                state.total_count,
                state.page_size,
                offsets.join(", ")
            );
        }
        Commands::Crawl => {
            let state = pipeline.plan().await.map_err(fail)?;
            let crawl = pipeline.crawl(&state).await.map_err(fail)?;
            println!(
                "staged {} records from {} pages",
                crawl.records, crawl.pages
            );
        }
        Commands::Merge => {
            let dataset = pipeline.merge().map_err(fail)?;
            println!(
                "merged {} fragments into {} ({} records)",
                dataset.fragments_merged,
                dataset.path.display(),
                dataset.record_count
            );
        }
        Commands::Load => {
            let database_url = pipeline.config().require_database_url()?.to_owned();
            let report = pipeline
                .load(&PgStore, &database_url)
                .await
                .map_err(fail)?;
            println!("loaded into {}.{}", report.database, report.table);
        }
    }

    Ok(())
}

/// Logs the failing stage and wraps the error so the exit diagnostic names it.
fn fail(err: PipelineError) -> anyhow::Error {
    let stage = err.stage();
    tracing::error!(stage, error = %err, "pipeline failed");
    anyhow::Error::new(err).context(format!("{stage} stage failed"))
}
