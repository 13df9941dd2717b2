#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the data directory.
//!
//! All paths live under the project root's `data/` directory unless
//! `PARKING_MAP_DATA_DIR` points somewhere else.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "PARKING_MAP_DATA_DIR";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`.
///
/// # Panics
///
/// Panics if the project root cannot be resolved.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("Failed to find project root from CARGO_MANIFEST_DIR")
        .to_path_buf()
}

/// Returns the `data/` directory path, honoring [`DATA_DIR_ENV`].
#[must_use]
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map_or_else(|| project_root().join("data"), PathBuf::from)
}

/// Returns the path of the raw ticket `DuckDB` file.
#[must_use]
pub fn tickets_db_path() -> PathBuf {
    data_dir().join("parking_tickets.duckdb")
}

/// Returns the `data/derived/` directory for aggregate datasets.
#[must_use]
pub fn derived_dir() -> PathBuf {
    data_dir().join("derived")
}

/// Returns the path of the per-segment, per-hour aggregate dataset.
#[must_use]
pub fn segment_time_counts_path() -> PathBuf {
    derived_dir().join("segment_time_counts.parquet")
}

/// Returns the path of the per-segment summary dataset.
#[must_use]
pub fn segment_summary_path() -> PathBuf {
    derived_dir().join("segment_summary.parquet")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Ensures the parent directory of `path` exists.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}
