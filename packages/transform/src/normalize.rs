//! Issue date and violation time parsing.
//!
//! Violation times arrive as `HHMM` (24-hour) or `HHMMA` / `HHMMP` (12-hour
//! with a one-letter meridiem). Only the issue date has to parse: a missing
//! or malformed time keeps the date at midnight.

use chrono::{Datelike as _, NaiveDate, NaiveDateTime, NaiveTime, Timelike as _};
use parking_map_ticket_models::{DayOfWeek, TicketRecord};

use crate::segment::record_segment_id;

/// Shortest suffixed time string that is read as 12-hour.
const MIN_SUFFIXED_LEN: usize = 5;

/// Day/hour bucket of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot {
    /// Day of the week.
    pub day_of_week: DayOfWeek,
    /// Hour of the day (0-23).
    pub hour_of_day: u8,
}

impl From<NaiveDateTime> for TimeSlot {
    fn from(ts: NaiveDateTime) -> Self {
        Self {
            day_of_week: ts.weekday().into(),
            hour_of_day: u8::try_from(ts.hour()).unwrap_or(0),
        }
    }
}

/// A ticket mapped onto its segment and time slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTicket {
    /// Segment identifier.
    pub segment_id: String,
    /// Day/hour bucket.
    pub slot: TimeSlot,
}

/// Maps a stored ticket to its segment and time slot. Returns `None` when
/// the issue date does not parse.
#[must_use]
pub fn normalize_ticket(record: &TicketRecord) -> Option<NormalizedTicket> {
    let ts = parse_issue_timestamp(
        record.issue_date.as_deref(),
        record.violation_time.as_deref(),
    )?;
    Some(NormalizedTicket {
        segment_id: record_segment_id(record),
        slot: ts.into(),
    })
}

/// Combines an issue date and a raw violation time into a timestamp.
///
/// Returns `None` only when the date is missing or malformed.
#[must_use]
pub fn parse_issue_timestamp(
    issue_date: Option<&str>,
    violation_time: Option<&str>,
) -> Option<NaiveDateTime> {
    let date = parse_issue_date(issue_date?)?;
    let time = violation_time
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .and_then(parse_violation_time)
        .unwrap_or(NaiveTime::MIN);
    Some(date.and_time(time))
}

/// Parses `YYYY-MM-DD`, or the date part of a Socrata floating timestamp
/// (`YYYY-MM-DDTHH:MM:SS.fff`).
#[must_use]
pub fn parse_issue_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts.date());
    }
    None
}

/// Parses a trimmed violation time.
///
/// A trailing `A`/`P` marks 12-hour notation, but only on strings of at
/// least five characters; shorter ones are read as 24-hour and fail on the
/// letter.
#[must_use]
pub fn parse_violation_time(s: &str) -> Option<NaiveTime> {
    if s.len() >= MIN_SUFFIXED_LEN {
        if let Some(digits) = s.strip_suffix('A') {
            let (hour, minute) = parse_hhmm(digits)?;
            return NaiveTime::from_hms_opt(if hour == 12 { 0 } else { hour }, minute, 0);
        }
        if let Some(digits) = s.strip_suffix('P') {
            let (hour, minute) = parse_hhmm(digits)?;
            return NaiveTime::from_hms_opt(if hour == 12 { hour } else { hour + 12 }, minute, 0);
        }
    }
    let (hour, minute) = parse_hhmm(s)?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Splits a digit string into hour and minute the way `%H%M` matches it:
/// the hour takes two digits when they form 00-23, otherwise one, and the
/// minute (one digit, or two forming 00-59) must consume the rest.
///
/// So `"130"` is 13:00, `"930"` is 09:30, and `"45"` is 04:05.
fn parse_hhmm(s: &str) -> Option<(u32, u32)> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    [2, 1]
        .into_iter()
        .filter(|&split| split < s.len())
        .find_map(|split| {
            let hour: u32 = s[..split].parse().ok()?;
            let minute = &s[split..];
            let minute_ok = match minute.as_bytes() {
                [_] => true,
                [tens, _] => *tens <= b'5',
                _ => false,
            };
            if hour >= 24 || !minute_ok {
                return None;
            }
            Some((hour, minute.parse().ok()?))
        })
}
