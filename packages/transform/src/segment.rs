//! Segment identity.
//!
//! A segment is the (borough, street, cross street, cross street) tuple,
//! uppercased and trimmed, joined with `" | "`. Tickets whose fields differ
//! only in case or surrounding whitespace land on the same segment.

use parking_map_ticket_models::TicketRecord;

/// Separator between segment components.
pub const SEGMENT_SEPARATOR: &str = " | ";

/// Builds a segment identifier from its raw components. Missing components
/// are empty.
#[must_use]
pub fn segment_id(
    borough: Option<&str>,
    street_name: Option<&str>,
    intersecting_street_1: Option<&str>,
    intersecting_street_2: Option<&str>,
) -> String {
    [
        borough,
        street_name,
        intersecting_street_1,
        intersecting_street_2,
    ]
    .iter()
    .map(|part| part.unwrap_or_default().trim().to_uppercase())
    .collect::<Vec<_>>()
    .join(SEGMENT_SEPARATOR)
}

/// Segment identifier of a stored ticket.
#[must_use]
pub fn record_segment_id(record: &TicketRecord) -> String {
    segment_id(
        record.violation_county.as_deref(),
        record.street_name.as_deref(),
        record.intersecting_street_1.as_deref(),
        record.intersecting_street_2.as_deref(),
    )
}

/// Returns `true` when a ticket can be placed on a segment: it needs a
/// borough and a street name, even blank ones, and a non-empty identifier.
///
/// Blank components still give a distinct identifier such as `" |  |  | "`,
/// so such tickets are kept under it.
#[must_use]
pub fn is_locatable(record: &TicketRecord, segment_id: &str) -> bool {
    record.violation_county.is_some()
        && record.street_name.is_some()
        && !segment_id.trim().is_empty()
}
