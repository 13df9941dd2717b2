#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Derived datasets for the parking map.
//!
//! Stored tickets are normalized onto a segment and a day/hour slot
//! ([`normalize`], [`segment`]), counted per bucket ([`aggregate`]), and
//! rolled up per segment ([`summary`]). Both outputs are recomputed from
//! scratch on every run.

pub mod aggregate;
pub mod normalize;
pub mod segment;
pub mod summary;

use std::path::PathBuf;

use parking_map_database::DbError;
use serde::{Deserialize, Serialize};

/// Errors that can occur while building derived datasets.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The input dataset for this stage has not been built.
    #[error("Missing input dataset: {}", path.display())]
    MissingInput {
        /// Path that was expected to exist.
        path: PathBuf,
    },

    /// Reading or writing storage failed.
    #[error(transparent)]
    Db(DbError),
}

impl From<DbError> for TransformError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::MissingInput { path } => Self::MissingInput { path },
            other => Self::Db(other),
        }
    }
}

/// Outcome of one transform stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Input rows that took part in the computation.
    pub records_processed: u64,
    /// Rows written to the output dataset.
    pub records_output: u64,
    /// Where the output was written.
    pub output_path: PathBuf,
}

/// Running mean over finite values.
#[derive(Debug, Default)]
pub(crate) struct Mean {
    sum: f64,
    n: u64,
}

impl Mean {
    pub(crate) fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v;
            self.n += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn value(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / self.n as f64)
    }
}
