#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parking ticket record types and the derived aggregate rows.
//!
//! Raw tickets arrive from the Open Parking and Camera Violations API as flat
//! JSON objects ([`RawPayload`]). The store keeps a fixed set of known columns
//! ([`RAW_COLUMNS`]) next to the verbatim payload. The transform stage reads
//! them back as [`TicketRecord`]s and produces [`SegmentBucket`] and
//! [`SegmentSummary`] rows.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A raw ticket exactly as returned by the API: a flat key/value object.
pub type RawPayload = serde_json::Map<String, serde_json::Value>;

/// Column holding the natural key of a ticket.
pub const NATURAL_KEY: &str = "summons_number";

/// Column holding the verbatim JSON payload.
pub const PAYLOAD_COLUMN: &str = "raw_payload";

/// Category label used in summaries when a segment has no known ticket type.
pub const UNKNOWN_TICKET_TYPES: &str = "Unknown";

/// Storage type of a known ticket column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Stored as text. Non-string JSON scalars are rendered to strings.
    Text,
    /// Stored as a double. Non-numeric values are stored as NULL.
    Double,
}

impl ColumnKind {
    /// SQL type name used in the `raw_tickets` table.
    #[must_use]
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Double => "DOUBLE",
        }
    }
}

/// Known ticket fields persisted as columns, in table order. The API field
/// names match the column names 1:1.
pub const RAW_COLUMNS: &[(&str, ColumnKind)] = &[
    (NATURAL_KEY, ColumnKind::Text),
    ("issue_date", ColumnKind::Text),
    ("violation_time", ColumnKind::Text),
    ("violation", ColumnKind::Text),
    ("violation_description", ColumnKind::Text),
    ("violation_county", ColumnKind::Text),
    ("house_number", ColumnKind::Text),
    ("street_name", ColumnKind::Text),
    ("intersecting_street_1", ColumnKind::Text),
    ("intersecting_street_2", ColumnKind::Text),
    ("violation_precinct", ColumnKind::Text),
    ("violation_status", ColumnKind::Text),
    ("vehicle_make", ColumnKind::Text),
    ("vehicle_color", ColumnKind::Text),
    ("vehicle_body_type", ColumnKind::Text),
    ("vehicle_expiration_date", ColumnKind::Text),
    ("vehicle_year", ColumnKind::Text),
    ("registration_state", ColumnKind::Text),
    ("street_code1", ColumnKind::Text),
    ("street_code2", ColumnKind::Text),
    ("street_code3", ColumnKind::Text),
    ("latitude", ColumnKind::Double),
    ("longitude", ColumnKind::Double),
    ("community_board", ColumnKind::Text),
    ("fine_amount", ColumnKind::Double),
    ("amount_due", ColumnKind::Double),
    ("penalty_amount", ColumnKind::Double),
    ("interest_amount", ColumnKind::Double),
    ("reduction_amount", ColumnKind::Double),
    ("payment_amount", ColumnKind::Double),
    ("precinct", ColumnKind::Text),
    ("law_section", ColumnKind::Text),
    ("issuing_agency", ColumnKind::Text),
    ("summons_image", ColumnKind::Text),
    ("violation_code", ColumnKind::Text),
    ("time_first_observed", ColumnKind::Text),
    ("ticket_type", ColumnKind::Text),
];

/// Reads a payload field as text.
///
/// Strings are returned as-is, numbers and booleans are rendered, nested
/// values are rendered as compact JSON, and `null` or a missing key yields
/// `None`.
#[must_use]
pub fn payload_text(payload: &RawPayload, field: &str) -> Option<String> {
    match payload.get(field)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Reads a payload field as a finite number.
///
/// Accepts JSON numbers and numeric strings (the Socrata API serializes
/// most numbers as strings). Anything else yields `None`.
#[must_use]
pub fn payload_number(payload: &RawPayload, field: &str) -> Option<f64> {
    let value = match payload.get(field)? {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Returns the natural key of a payload, or `None` when it is missing or
/// blank.
#[must_use]
pub fn payload_key(payload: &RawPayload) -> Option<String> {
    payload_text(payload, NATURAL_KEY)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

/// A stored ticket as read back from the `raw_tickets` table.
///
/// Only the fields the transform stage and downstream tooling use are typed;
/// everything else stays available through [`TicketRecord::raw_payload`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Natural key (summons number).
    pub summons_number: String,
    /// Issue date, normally `YYYY-MM-DD`.
    pub issue_date: Option<String>,
    /// Raw violation time (`HHMM`, optionally suffixed with `A`/`P`).
    pub violation_time: Option<String>,
    /// Violation code.
    pub violation_code: Option<String>,
    /// Free-text violation description.
    pub violation_description: Option<String>,
    /// Ticket category, used as the bucketing category.
    pub ticket_type: Option<String>,
    /// Borough / county code.
    pub violation_county: Option<String>,
    /// Street the violation occurred on.
    pub street_name: Option<String>,
    /// First intersecting street.
    pub intersecting_street_1: Option<String>,
    /// Second intersecting street.
    pub intersecting_street_2: Option<String>,
    /// Latitude, when supplied and numeric.
    pub latitude: Option<f64>,
    /// Longitude, when supplied and numeric.
    pub longitude: Option<f64>,
    /// Fine amount.
    pub fine_amount: Option<f64>,
    /// Amount still due.
    pub amount_due: Option<f64>,
    /// Penalty amount.
    pub penalty_amount: Option<f64>,
    /// Interest amount.
    pub interest_amount: Option<f64>,
    /// Reduction amount.
    pub reduction_amount: Option<f64>,
    /// Payment amount.
    pub payment_amount: Option<f64>,
    /// Precinct.
    pub precinct: Option<String>,
    /// Issuing agency.
    pub issuing_agency: Option<String>,
    /// Verbatim JSON payload.
    pub raw_payload: String,
}

impl TicketRecord {
    /// Builds a record from a raw payload, applying the same field coercion
    /// the store applies on upsert. Returns `None` when the payload has no
    /// usable natural key.
    #[must_use]
    pub fn from_payload(payload: &RawPayload) -> Option<Self> {
        let summons_number = payload_key(payload)?;
        let text = |field: &str| payload_text(payload, field);
        let number = |field: &str| payload_number(payload, field);

        Some(Self {
            summons_number,
            issue_date: text("issue_date"),
            violation_time: text("violation_time"),
            violation_code: text("violation_code"),
            violation_description: text("violation_description"),
            ticket_type: text("ticket_type"),
            violation_county: text("violation_county"),
            street_name: text("street_name"),
            intersecting_street_1: text("intersecting_street_1"),
            intersecting_street_2: text("intersecting_street_2"),
            latitude: number("latitude"),
            longitude: number("longitude"),
            fine_amount: number("fine_amount"),
            amount_due: number("amount_due"),
            penalty_amount: number("penalty_amount"),
            interest_amount: number("interest_amount"),
            reduction_amount: number("reduction_amount"),
            payment_amount: number("payment_amount"),
            precinct: text("precinct"),
            issuing_agency: text("issuing_agency"),
            raw_payload: serde_json::Value::Object(payload.clone()).to_string(),
        })
    }
}

/// Day of the week, ordered Monday first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum DayOfWeek {
    /// Monday
    Monday,
    /// Tuesday
    Tuesday,
    /// Wednesday
    Wednesday,
    /// Thursday
    Thursday,
    /// Friday
    Friday,
    /// Saturday
    Saturday,
    /// Sunday
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

/// One aggregate row: tickets on a segment for a weekday, hour, and ticket
/// type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentBucket {
    /// Normalized segment identifier.
    pub segment_id: String,
    /// Day of the week.
    pub day_of_week: DayOfWeek,
    /// Hour of the day (0-23).
    pub hour_of_day: u8,
    /// Ticket type. `None` groups tickets with no recorded type.
    pub ticket_type: Option<String>,
    /// Number of contributing tickets.
    pub ticket_count: u64,
    /// Mean latitude of contributors that have one.
    pub avg_latitude: Option<f64>,
    /// Mean longitude of contributors that have one.
    pub avg_longitude: Option<f64>,
    /// First-seen street name.
    pub street_name: Option<String>,
    /// First-seen first intersecting street.
    pub intersecting_street_1: Option<String>,
    /// First-seen second intersecting street.
    pub intersecting_street_2: Option<String>,
    /// First-seen borough.
    pub violation_county: Option<String>,
}

/// One summary row per segment, rolled up from its [`SegmentBucket`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    /// Normalized segment identifier.
    pub segment_id: String,
    /// Sum of the bucket counts for this segment.
    pub total_tickets: u64,
    /// Representative borough.
    pub borough: Option<String>,
    /// Representative street name.
    pub street_name: Option<String>,
    /// Representative first intersecting street.
    pub intersecting_street_1: Option<String>,
    /// Representative second intersecting street.
    pub intersecting_street_2: Option<String>,
    /// Mean of the bucket mean latitudes.
    pub latitude: Option<f64>,
    /// Mean of the bucket mean longitudes.
    pub longitude: Option<f64>,
    /// Sorted distinct ticket types joined with `", "`, or
    /// [`UNKNOWN_TICKET_TYPES`].
    pub ticket_types: String,
}
