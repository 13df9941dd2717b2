//! Source registry: loads source definitions from embedded TOML configs.
//!
//! Each `.toml` file in `packages/source/sources/` is baked into the binary
//! at compile time via [`include_str!`].

use crate::source_def::{SourceDefinition, parse_source_toml};

/// Identifier of the source used when none is specified.
pub const DEFAULT_SOURCE_ID: &str = "nyc_parking";

/// TOML configs embedded at compile time.
const SOURCE_TOMLS: &[(&str, &str)] = &[(
    "nyc_parking",
    include_str!("../sources/nyc_parking.toml"),
)];

/// Returns all configured source definitions, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (the configs are embedded, so the
/// tests below catch this before release).
#[must_use]
pub fn all_sources() -> Vec<SourceDefinition> {
    SOURCE_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_source_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Looks up a source definition by id.
#[must_use]
pub fn find_source(id: &str) -> Option<SourceDefinition> {
    all_sources().into_iter().find(|s| s.id == id)
}

/// Returns the default source definition (NYC parking violations).
///
/// # Panics
///
/// Panics if the embedded default definition is missing.
#[must_use]
pub fn default_source() -> SourceDefinition {
    find_source(DEFAULT_SOURCE_ID)
        .unwrap_or_else(|| panic!("Missing embedded source definition {DEFAULT_SOURCE_ID}"))
}
