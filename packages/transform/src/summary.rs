//! Per-segment rollup of the bucket dataset.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use parking_map_database::datasets::{read_segment_time_counts, write_segment_summaries};
use parking_map_ticket_models::{SegmentBucket, SegmentSummary, UNKNOWN_TICKET_TYPES};

use crate::{AggregationResult, Mean, TransformError};

#[derive(Debug, Default)]
struct SegmentAccumulator {
    total: u64,
    borough: Option<String>,
    street_name: Option<String>,
    intersecting_street_1: Option<String>,
    intersecting_street_2: Option<String>,
    latitude: Mean,
    longitude: Mean,
    ticket_types: BTreeSet<String>,
}

impl SegmentAccumulator {
    fn add(&mut self, bucket: &SegmentBucket) {
        self.total += bucket.ticket_count;
        if self.borough.is_none() {
            self.borough.clone_from(&bucket.violation_county);
        }
        if self.street_name.is_none() {
            self.street_name.clone_from(&bucket.street_name);
        }
        if self.intersecting_street_1.is_none() {
            self.intersecting_street_1
                .clone_from(&bucket.intersecting_street_1);
        }
        if self.intersecting_street_2.is_none() {
            self.intersecting_street_2
                .clone_from(&bucket.intersecting_street_2);
        }
        self.latitude.add(bucket.avg_latitude);
        self.longitude.add(bucket.avg_longitude);
        if let Some(ticket_type) = bucket.ticket_type.as_ref().filter(|t| !t.is_empty()) {
            self.ticket_types.insert(ticket_type.clone());
        }
    }

    fn into_summary(self, segment_id: String) -> SegmentSummary {
        let ticket_types = if self.ticket_types.is_empty() {
            UNKNOWN_TICKET_TYPES.to_string()
        } else {
            self.ticket_types
                .into_iter()
                .collect::<Vec<_>>()
                .join(", ")
        };

        SegmentSummary {
            segment_id,
            total_tickets: self.total,
            borough: self.borough,
            street_name: self.street_name,
            intersecting_street_1: self.intersecting_street_1,
            intersecting_street_2: self.intersecting_street_2,
            latitude: self.latitude.value(),
            longitude: self.longitude.value(),
            ticket_types,
        }
    }
}

/// Rolls buckets up to one summary per segment, ordered by segment id.
///
/// Coordinates are the mean of the bucket means. Representative location
/// strings are the first non-null values in `buckets` order.
#[must_use]
pub fn summarize_buckets(buckets: &[SegmentBucket]) -> Vec<SegmentSummary> {
    let mut segments: BTreeMap<&str, SegmentAccumulator> = BTreeMap::new();
    for bucket in buckets {
        segments
            .entry(bucket.segment_id.as_str())
            .or_default()
            .add(bucket);
    }

    segments
        .into_iter()
        .map(|(segment_id, acc)| acc.into_summary(segment_id.to_string()))
        .collect()
}

/// Reads the bucket dataset at `input_path` and writes the segment summary
/// to `output_path`, replacing any previous file.
///
/// An empty bucket dataset logs a warning and writes an empty summary.
///
/// # Errors
///
/// Returns [`TransformError::MissingInput`] if `input_path` does not exist,
/// or another [`TransformError`] if reading or writing fails.
pub fn build_segment_summary(
    input_path: &Path,
    output_path: &Path,
) -> Result<AggregationResult, TransformError> {
    let buckets = read_segment_time_counts(input_path)?;
    if buckets.is_empty() {
        log::warn!(
            "Aggregated dataset {} is empty; writing an empty summary",
            input_path.display()
        );
    }

    let summaries = summarize_buckets(&buckets);
    write_segment_summaries(output_path, &summaries)?;
    log::info!(
        "Wrote segment summary to {} ({} rows)",
        output_path.display(),
        summaries.len()
    );

    Ok(AggregationResult {
        records_processed: buckets.len() as u64,
        records_output: summaries.len() as u64,
        output_path: output_path.to_path_buf(),
    })
}
