#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for ingesting parking tickets from the open data API into the
//! local ticket store.
//!
//! [`ingest`] drains a lazy page stream from any [`PageSource`], optionally
//! mirrors each page to a JSON-lines snapshot, and upserts it into the
//! store. [`run_ingestion`] wires the default Socrata source and store
//! together from an [`IngestOptions`].

pub mod snapshot;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{StreamExt, pin_mut};
use parking_map_database::DbError;
use parking_map_database::ticket_db::TicketStore;
use parking_map_ingest_models::{IngestOptions, IngestionStats};
use parking_map_source::progress::ProgressCallback;
use parking_map_source::socrata::SocrataClient;
use parking_map_source::source_def::SourceDefinition;
use parking_map_source::{PageSource, SourceError, pagination};
use parking_map_source_models::PageQuery;

use crate::snapshot::SnapshotWriter;

/// Errors that can occur during ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Fetching a page failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Writing to the ticket store failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Creating or writing the snapshot file failed.
    #[error("Snapshot error for {}: {source}", path.display())]
    Snapshot {
        /// Snapshot file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized to the snapshot.
    #[error("Snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fully resolved paging parameters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlan {
    /// First page request. Later pages advance its offset by its limit.
    pub first_page: PageQuery,
    /// Delay between page fetches.
    pub delay: Duration,
    /// Stop after this many pages.
    pub max_pages: Option<u64>,
}

impl RunPlan {
    /// Resolves `options` against the source defaults. The page size is
    /// never below 1.
    #[must_use]
    pub fn resolve(options: &IngestOptions, definition: &SourceDefinition) -> Self {
        let page_size = options.page_size.unwrap_or(definition.page_size).max(1);
        Self {
            first_page: PageQuery::first(
                page_size,
                options.issue_dates,
                !options.include_camera_tickets,
            ),
            delay: options.sleep.unwrap_or_else(|| definition.sleep()),
            max_pages: options.max_pages,
        }
    }
}

/// Pages through `source` until it is exhausted (or `plan.max_pages` is
/// reached).
///
/// Each page is counted, appended to the snapshot when `snapshot_path` is
/// set, and upserted into `store` when one is given. Passing `None` for the
/// store is a dry run.
///
/// # Errors
///
/// Returns the first source, store, or snapshot error. Pages processed
/// before the failure stay committed and the snapshot file is closed.
pub async fn ingest<S>(
    source: &S,
    mut store: Option<&mut TicketStore>,
    plan: &RunPlan,
    snapshot_path: Option<&Path>,
    progress: &dyn ProgressCallback,
) -> Result<IngestionStats, IngestError>
where
    S: PageSource + ?Sized,
{
    let start = Instant::now();
    let mut stats = IngestionStats::default();

    log::info!(
        "[{}] ingesting {} records per page{}",
        source.id(),
        plan.first_page.limit,
        if store.is_none() { " (dry run)" } else { "" }
    );

    let mut snapshot = snapshot_path.map(SnapshotWriter::create).transpose()?;

    let page_limit = plan
        .max_pages
        .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
    let pages = pagination::pages(source, plan.first_page, plan.delay).take(page_limit);
    pin_mut!(pages);

    while let Some(page) = pages.next().await {
        let page = page?;
        let fetched = page.len() as u64;
        stats.pages_fetched += 1;
        stats.records_fetched += fetched;
        log::info!("Fetched {fetched} records (page {})", stats.pages_fetched);
        progress.inc(fetched);
        progress.set_message(format!("Fetching tickets (page {})", stats.pages_fetched));

        if let Some(writer) = snapshot.as_mut() {
            writer.append_page(&page)?;
        }

        if let Some(store) = store.as_deref_mut() {
            stats.records_inserted += store.upsert_records(&page)?;
        }
    }

    if let Some(writer) = snapshot {
        let path = writer.path().to_path_buf();
        let lines = writer.finish()?;
        log::info!("Snapshot complete: {lines} records in {}", path.display());
    }

    stats.duration = start.elapsed();
    let summary = format!(
        "{} pages, {} fetched, {} inserted in {:.1}s",
        stats.pages_fetched,
        stats.records_fetched,
        stats.records_inserted,
        stats.duration.as_secs_f64()
    );
    log::info!("[{}] ingestion complete: {summary}", source.id());
    progress.finish(summary);

    Ok(stats)
}

/// Ingests from the default Socrata source into the store configured by
/// `options`.
///
/// The store is opened and initialized unless this is a dry run.
///
/// # Errors
///
/// Returns [`IngestError`] if the client cannot be built, the store cannot
/// be opened, or ingestion fails.
pub async fn run_ingestion(
    options: &IngestOptions,
    progress: Arc<dyn ProgressCallback>,
) -> Result<IngestionStats, IngestError> {
    let definition = parking_map_source::registry::default_source();
    let plan = RunPlan::resolve(options, &definition);
    let client = SocrataClient::new(definition, options.app_token.as_deref())?;

    let mut store = if options.dry_run {
        None
    } else {
        let path = options
            .db_path
            .clone()
            .unwrap_or_else(parking_map_database::paths::tickets_db_path);
        let store = TicketStore::open(&path)?;
        store.initialize()?;
        Some(store)
    };

    ingest(
        &client,
        store.as_mut(),
        &plan,
        options.snapshot_path.as_deref(),
        progress.as_ref(),
    )
    .await
}
