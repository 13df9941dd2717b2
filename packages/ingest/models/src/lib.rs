#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ingestion configuration and result types.

use std::path::PathBuf;
use std::time::Duration;

use parking_map_source_models::IssueDateRange;
use serde::{Deserialize, Serialize};

/// Configuration for one ingestion run.
///
/// Unset values fall back to the source definition's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Ticket store location. `None` uses the default data directory.
    pub db_path: Option<PathBuf>,
    /// Optional client token sent with every request.
    pub app_token: Option<String>,
    /// Inclusive issue-date bounds.
    pub issue_dates: IssueDateRange,
    /// Records per page.
    pub page_size: Option<u64>,
    /// Keep camera-enforced ticket types instead of excluding them.
    pub include_camera_tickets: bool,
    /// Fetch (and snapshot) without writing to the store.
    pub dry_run: bool,
    /// Mirror every fetched record to this JSON-lines file.
    pub snapshot_path: Option<PathBuf>,
    /// Delay between page fetches.
    pub sleep: Option<Duration>,
    /// Stop after this many pages (useful for testing).
    pub max_pages: Option<u64>,
}

/// Result of a completed ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionStats {
    /// Number of non-empty pages fetched.
    pub pages_fetched: u64,
    /// Total number of records fetched from the source.
    pub records_fetched: u64,
    /// Number of rows written to the store.
    pub records_inserted: u64,
    /// How long the run took.
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_exclude_cameras_and_write() {
        let options = IngestOptions::default();
        assert!(!options.include_camera_tickets);
        assert!(!options.dry_run);
        assert_eq!(options.issue_dates, IssueDateRange::default());
        assert_eq!(options.page_size, None);
    }

    #[test]
    fn stats_start_at_zero() {
        let stats = IngestionStats::default();
        assert_eq!(stats.pages_fetched, 0);
        assert_eq!(stats.duration, Duration::ZERO);
    }
}
