#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Parking ticket source API client.
//!
//! A data provider implements the [`PageSource`] trait to return one page of
//! raw tickets per call. [`socrata::SocrataClient`] is the production
//! implementation; [`pagination::pages`] turns any source into a lazy stream
//! of pages that ends at the first empty page.

pub mod pagination;
pub mod progress;
pub mod registry;
pub mod socrata;
pub mod source_def;

use async_trait::async_trait;
use parking_map_source_models::PageQuery;
use parking_map_ticket_models::RawPayload;

/// Errors that can occur while talking to a data source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP failure (connection error, timeout, non-2xx status).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response did not have the expected shape.
    #[error("Schema error: {message}")]
    Schema {
        /// Description of what went wrong.
        message: String,
    },

    /// The source definition is malformed or cannot be turned into a client.
    #[error("Source definition error: {message}")]
    Definition {
        /// Description of what went wrong.
        message: String,
    },
}

/// A remote provider of paged raw tickets.
///
/// A single call either succeeds or fails once; implementations do not
/// retry. An empty page signals that the result set is exhausted.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Returns a unique identifier for this source (e.g., `"nyc_parking"`).
    fn id(&self) -> &str;

    /// Fetches the page of tickets described by `query`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Transport`] on network/HTTP failure and
    /// [`SourceError::Schema`] if the response is not a list of records.
    async fn fetch_page(&self, query: &PageQuery) -> Result<Vec<RawPayload>, SourceError>;
}
