#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Local storage for the parking map.
//!
//! Raw tickets live in an embedded `DuckDB` file (see [`ticket_db`]). The
//! derived segment datasets are Parquet files written and read through an
//! in-memory `DuckDB` connection (see [`datasets`]). [`paths`] resolves the
//! default locations under the `data/` directory.

pub mod datasets;
pub mod paths;
pub mod ticket_db;

use std::path::PathBuf;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be converted to its model type.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// A required input dataset does not exist.
    #[error("Missing input dataset: {}", path.display())]
    MissingInput {
        /// Path that was expected to exist.
        path: PathBuf,
    },
}
