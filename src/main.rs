use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod bulletin;
mod config;
mod discover;
mod fetch;
mod normalize;
mod output;
mod pdf;
mod period;
mod run;
mod store;
mod types;
mod view;

use config::{Config, DEFAULT_SCRATCH_DIR, DEFAULT_STORE_PATH};
use fetch::HttpClient;
use pdf::PdfTextTables;
use run::RunOutcome;

#[derive(Parser)]
#[command(name = "hoiku-aki")]
#[command(about = "Childcare availability bulletin scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download new bulletins and append their tables to the CSV
    Run {
        /// Base URL relative links are resolved against
        #[arg(long, env = "BASE_URL")]
        base_url: String,
        /// Index page listing the bulletins
        #[arg(long, env = "SCRAPING_URL")]
        scraping_url: String,
        /// Cumulative CSV file
        #[arg(short, long, env = "OUTPUT_DIRECTORY")]
        output: PathBuf,
        /// Working directory for downloaded PDFs (removed after the run)
        #[arg(long, default_value = DEFAULT_SCRATCH_DIR)]
        scratch_dir: PathBuf,
        /// JSON file of already downloaded bulletin URLs
        #[arg(long, default_value = DEFAULT_STORE_PATH)]
        store: PathBuf,
        /// Exit with status 1 when the run failed or partially failed
        #[arg(long)]
        fail_on_error: bool,
    },
    /// List facilities, or render availability history for selected ones
    View {
        /// Cumulative CSV file
        #[arg(short, long, env = "OUTPUT_DIRECTORY", default_value = "all.csv")]
        input: PathBuf,
        /// Facility to include (repeatable)
        #[arg(short, long = "facility", value_name = "NAME")]
        facilities: Vec<String>,
        /// HTML file to write
        #[arg(short, long, default_value = "view.html")]
        output: PathBuf,
    },
}

fn run_scrape(config: &Config, fail_on_error: bool) -> Result<()> {
    let client = HttpClient::new()?;
    let outcome = run::run(config, &client, &PdfTextTables);

    match &outcome {
        RunOutcome::NoUpdate => tracing::info!("no update"),
        RunOutcome::Updated(summary) => {
            for saved in &summary.saved {
                tracing::info!(
                    period = %saved.period,
                    page = %saved.page_url,
                    pdf = %saved.pdf_url,
                    path = %saved.path.display(),
                    "downloaded"
                );
            }
            for skipped in &summary.skipped_tables {
                tracing::warn!(
                    page = skipped.page,
                    index = skipped.index,
                    columns = skipped.columns,
                    reason = skipped.reason,
                    "table not recognized, rows dropped"
                );
            }
            for failure in &summary.failures {
                tracing::error!(subject = %failure.subject, error = %format!("{:#}", failure.error), "not processed");
            }
            if summary.is_partial() {
                tracing::warn!("update partially complete: {}", outcome);
            } else {
                tracing::info!("update complete: {}", outcome);
            }
        }
        RunOutcome::Failed(_) => tracing::error!("run {}", outcome),
    }

    if fail_on_error && outcome.is_failure() {
        std::process::exit(1);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            base_url,
            scraping_url,
            output,
            scratch_dir,
            store,
            fail_on_error,
        } => {
            let config = Config::new(&base_url, &scraping_url, output, scratch_dir, store)?;
            run_scrape(&config, fail_on_error)
        }
        Commands::View {
            input,
            facilities,
            output,
        } => view::run_view(&input, &facilities, &output),
    }
}
