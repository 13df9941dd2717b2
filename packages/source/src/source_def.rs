//! Config-driven source definition.
//!
//! [`SourceDefinition`] captures everything about the remote dataset in a
//! serializable config struct: endpoint, paging defaults, filter columns,
//! and the camera ticket types excluded by default. Definitions are embedded
//! TOML files (see [`crate::registry`]) so tests can parse their own
//! fixtures without touching process-wide state.

use std::time::Duration;

use serde::Deserialize;

use crate::SourceError;

/// A complete, config-driven source definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier (e.g., `"nyc_parking"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Socrata resource URL (`.../resource/{dataset}.json`).
    pub api_url: String,
    /// Default records per page.
    pub page_size: u64,
    /// Default delay between page fetches, in milliseconds.
    #[serde(default)]
    pub sleep_ms: u64,
    /// Per-request timeout, in seconds.
    pub timeout_secs: u64,
    /// Header carrying the optional client token.
    pub token_header: String,
    /// Column the issue-date bounds are applied to.
    pub date_column: String,
    /// Column holding the ticket type.
    pub category_column: String,
    /// Ticket-type prefixes excluded when camera filtering is on.
    #[serde(default)]
    pub camera_ticket_types: Vec<String>,
}

impl SourceDefinition {
    /// Default delay between page fetches.
    #[must_use]
    pub const fn sleep(&self) -> Duration {
        Duration::from_millis(self.sleep_ms)
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Parses a [`SourceDefinition`] from a TOML string.
///
/// # Errors
///
/// Returns [`SourceError::Definition`] if the TOML is malformed or missing
/// required fields.
pub fn parse_source_toml(toml_str: &str) -> Result<SourceDefinition, SourceError> {
    toml::de::from_str(toml_str).map_err(|e| SourceError::Definition {
        message: e.to_string(),
    })
}
