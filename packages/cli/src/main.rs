#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the parking map pipeline.
//!
//! `ingest` pulls tickets from the open data API into the local store,
//! `aggregate` and `summary` rebuild the derived datasets, `run` chains all
//! three, and `status` reports what has been built so far.
//!
//! Uses `indicatif-log-bridge` (via [`parking_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use parking_map_cli_utils::{IndicatifProgress, MultiProgress};
use parking_map_database::datasets::dataset_status;
use parking_map_database::paths;
use parking_map_database::ticket_db::TicketStore;
use parking_map_ingest::run_ingestion;
use parking_map_ingest_models::{IngestOptions, IngestionStats};
use parking_map_source_models::IssueDateRange;
use parking_map_transform::AggregationResult;
use parking_map_transform::aggregate::{DEFAULT_MIN_SAMPLES, aggregate_ticket_counts};
use parking_map_transform::summary::build_segment_summary;

#[derive(Parser)]
#[command(name = "parking_map", about = "NYC parking ticket heatmap pipeline")]
struct Cli {
    /// Log at debug level (overrides the `RUST_LOG` default)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch tickets from the open data API into the local store
    Ingest(IngestArgs),
    /// Rebuild the per-segment, per-hour ticket counts
    Aggregate(AggregateArgs),
    /// Rebuild the per-segment summary from the ticket counts
    Summary(SummaryArgs),
    /// Ingest, aggregate, and summarize in one go
    Run {
        #[command(flatten)]
        ingest: IngestArgs,
        /// Minimum tickets a segment/day/hour bucket needs to be kept
        #[arg(long, default_value_t = DEFAULT_MIN_SAMPLES)]
        min_samples: u64,
    },
    /// Show the store size and which derived datasets exist
    Status {
        /// Ticket store path (default: `data/parking_tickets.duckdb`)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(Args)]
struct IngestArgs {
    /// Ticket store path (default: `data/parking_tickets.duckdb`)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Socrata app token sent as `X-App-Token`
    #[arg(long, env = "PARKING_MAP_APP_TOKEN", hide_env_values = true)]
    app_token: Option<String>,
    /// Earliest issue date to fetch (YYYY-MM-DD, inclusive)
    #[arg(long)]
    issue_date_from: Option<NaiveDate>,
    /// Latest issue date to fetch (YYYY-MM-DD, inclusive)
    #[arg(long)]
    issue_date_to: Option<NaiveDate>,
    /// Records per page (default: 50,000)
    #[arg(long)]
    page_size: Option<u64>,
    /// Fetch without writing to the store
    #[arg(long)]
    dry_run: bool,
    /// Mirror every fetched record to this JSON-lines file
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Seconds to sleep between pages (default: 0.25)
    #[arg(long, value_parser = parse_seconds)]
    sleep: Option<Duration>,
    /// Keep camera-enforced ticket types
    #[arg(long)]
    include_cameras: bool,
    /// Stop after this many pages
    #[arg(long)]
    max_pages: Option<u64>,
}

impl IngestArgs {
    fn to_options(&self) -> IngestOptions {
        IngestOptions {
            db_path: self.db.clone(),
            app_token: self.app_token.clone(),
            issue_dates: IssueDateRange::new(self.issue_date_from, self.issue_date_to),
            page_size: self.page_size,
            include_camera_tickets: self.include_cameras,
            dry_run: self.dry_run,
            snapshot_path: self.snapshot.clone(),
            sleep: self.sleep,
            max_pages: self.max_pages,
        }
    }
}

#[derive(Args)]
struct AggregateArgs {
    /// Ticket store path (default: `data/parking_tickets.duckdb`)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Output dataset (default: `data/derived/segment_time_counts.parquet`)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Minimum tickets a segment/day/hour bucket needs to be kept
    #[arg(long, default_value_t = DEFAULT_MIN_SAMPLES)]
    min_samples: u64,
}

#[derive(Args)]
struct SummaryArgs {
    /// Ticket counts dataset (default: `data/derived/segment_time_counts.parquet`)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Output dataset (default: `data/derived/segment_summary.parquet`)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("invalid number of seconds: {e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid number of seconds: {e}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let multi = parking_map_cli_utils::init_logger(cli.verbose);

    match cli.command {
        Commands::Ingest(args) => {
            ingest(&multi, &args).await?;
        }
        Commands::Aggregate(args) => {
            let db = args.db.unwrap_or_else(paths::tickets_db_path);
            let output = args.output.unwrap_or_else(paths::segment_time_counts_path);
            aggregate(&db, &output, args.min_samples)?;
        }
        Commands::Summary(args) => {
            let input = args.input.unwrap_or_else(paths::segment_time_counts_path);
            let output = args.output.unwrap_or_else(paths::segment_summary_path);
            print_result("Summary", &build_segment_summary(&input, &output)?);
        }
        Commands::Run {
            ingest: args,
            min_samples,
        } => {
            ingest(&multi, &args).await?;
            log::info!("Ingestion finished; rebuilding derived datasets");
            let db = args.db.unwrap_or_else(paths::tickets_db_path);
            let counts = paths::segment_time_counts_path();
            aggregate(&db, &counts, min_samples)?;
            print_result(
                "Summary",
                &build_segment_summary(&counts, &paths::segment_summary_path())?,
            );
        }
        Commands::Status { db } => {
            status(&db.unwrap_or_else(paths::tickets_db_path))?;
        }
    }

    Ok(())
}

async fn ingest(
    multi: &MultiProgress,
    args: &IngestArgs,
) -> Result<IngestionStats, Box<dyn std::error::Error>> {
    let options = args.to_options();
    let progress = IndicatifProgress::records_spinner(multi, "Fetching tickets");
    let stats = run_ingestion(&options, progress).await?;

    println!("Pages fetched:    {}", stats.pages_fetched);
    println!("Records fetched:  {}", stats.records_fetched);
    println!("Records inserted: {}", stats.records_inserted);
    println!("Duration:         {:.1}s", stats.duration.as_secs_f64());

    Ok(stats)
}

fn aggregate(db: &Path, output: &Path, min_samples: u64) -> Result<(), Box<dyn std::error::Error>> {
    let store = TicketStore::open(db)?;
    store.initialize()?;
    print_result(
        "Aggregation",
        &aggregate_ticket_counts(&store, output, min_samples)?,
    );
    Ok(())
}

fn print_result(stage: &str, result: &AggregationResult) {
    println!(
        "{stage}: {} input rows -> {} output rows ({})",
        result.records_processed,
        result.records_output,
        result.output_path.display()
    );
}

fn status(db: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if db.exists() {
        let store = TicketStore::open(db)?;
        store.initialize()?;
        println!("{:<22} {} tickets", "Ticket store", store.record_count()?);
    } else {
        println!("{:<22} not created yet", "Ticket store");
    }

    for (name, path) in [
        ("Segment time counts", paths::segment_time_counts_path()),
        ("Segment summary", paths::segment_summary_path()),
    ] {
        println!("{name:<22} {}", dataset_status(&path)?);
    }

    Ok(())
}
