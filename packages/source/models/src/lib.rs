#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Request types for fetching pages of parking tickets.
//!
//! A [`PageQuery`] fully describes one page request: where the page starts,
//! how large it is, and which server-side filters apply.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive bounds on the ticket issue date. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDateRange {
    /// Earliest issue date to include.
    pub from: Option<NaiveDate>,
    /// Latest issue date to include.
    pub to: Option<NaiveDate>,
}

impl IssueDateRange {
    /// Creates a range from optional bounds.
    #[must_use]
    pub const fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }
}

/// Parameters for a single page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    /// Maximum number of records in the page.
    pub limit: u64,
    /// Number of matching records to skip.
    pub offset: u64,
    /// Issue-date filter.
    pub issue_dates: IssueDateRange,
    /// Exclude camera-enforcement ticket types (tickets with no type are
    /// always kept).
    pub exclude_camera_tickets: bool,
}

impl PageQuery {
    /// Creates a query for the first page with the given size and filters.
    #[must_use]
    pub const fn first(limit: u64, issue_dates: IssueDateRange, exclude_camera_tickets: bool) -> Self {
        Self {
            limit,
            offset: 0,
            issue_dates,
            exclude_camera_tickets,
        }
    }

    /// Returns the query for the page that follows this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self {
            offset: self.offset + self.limit,
            ..*self
        }
    }
}
