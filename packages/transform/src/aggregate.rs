//! Per-segment, per-hour ticket counts.
//!
//! Every stored ticket is normalized onto a segment and time slot, grouped
//! by (segment, day, hour, ticket type), and reduced to a count, mean
//! coordinates, and first-seen location strings. Groups below the minimum
//! sample size are dropped and the rest are ranked by count.

use std::collections::BTreeMap;
use std::path::Path;

use parking_map_database::datasets::write_segment_time_counts;
use parking_map_database::ticket_db::TicketStore;
use parking_map_ticket_models::{DayOfWeek, SegmentBucket, TicketRecord};

use crate::normalize::normalize_ticket;
use crate::segment::is_locatable;
use crate::{AggregationResult, Mean, TransformError};

/// Default minimum number of tickets a bucket needs to be kept.
pub const DEFAULT_MIN_SAMPLES: u64 = 5;

/// Grouping key. Field order defines the order of equal-count buckets.
type BucketKey = (String, DayOfWeek, u8, Option<String>);

/// Keeps the first non-null value offered.
fn first_seen(slot: &mut Option<String>, value: Option<&String>) {
    if slot.is_none() {
        *slot = value.cloned();
    }
}

#[derive(Debug, Default)]
struct BucketAccumulator {
    count: u64,
    latitude: Mean,
    longitude: Mean,
    street_name: Option<String>,
    intersecting_street_1: Option<String>,
    intersecting_street_2: Option<String>,
    violation_county: Option<String>,
}

impl BucketAccumulator {
    fn add(&mut self, record: &TicketRecord) {
        self.count += 1;
        self.latitude.add(record.latitude);
        self.longitude.add(record.longitude);
        first_seen(&mut self.street_name, record.street_name.as_ref());
        first_seen(
            &mut self.intersecting_street_1,
            record.intersecting_street_1.as_ref(),
        );
        first_seen(
            &mut self.intersecting_street_2,
            record.intersecting_street_2.as_ref(),
        );
        first_seen(&mut self.violation_county, record.violation_county.as_ref());
    }
}

/// Buckets produced from a set of tickets.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// Tickets that parsed and could be placed on a segment.
    pub records_processed: u64,
    /// Kept buckets, highest count first.
    pub buckets: Vec<SegmentBucket>,
}

/// Groups `records` into buckets. Pure; `records` should be in ascending
/// summons-number order so that first-seen values are deterministic.
///
/// A `min_samples` of 0 is treated as 1.
#[must_use]
pub fn aggregate_records(records: &[TicketRecord], min_samples: u64) -> Aggregation {
    let min_samples = min_samples.max(1);
    let mut groups: BTreeMap<BucketKey, BucketAccumulator> = BTreeMap::new();
    let mut processed = 0u64;

    for record in records {
        let Some(normalized) = normalize_ticket(record) else {
            continue;
        };
        if !is_locatable(record, &normalized.segment_id) {
            continue;
        }
        processed += 1;

        let key = (
            normalized.segment_id,
            normalized.slot.day_of_week,
            normalized.slot.hour_of_day,
            record.ticket_type.clone(),
        );
        groups.entry(key).or_default().add(record);
    }

    let mut buckets: Vec<SegmentBucket> = groups
        .into_iter()
        .filter(|(_, acc)| acc.count >= min_samples)
        .map(|((segment_id, day_of_week, hour_of_day, ticket_type), acc)| {
            SegmentBucket {
                segment_id,
                day_of_week,
                hour_of_day,
                ticket_type,
                ticket_count: acc.count,
                avg_latitude: acc.latitude.value(),
                avg_longitude: acc.longitude.value(),
                street_name: acc.street_name,
                intersecting_street_1: acc.intersecting_street_1,
                intersecting_street_2: acc.intersecting_street_2,
                violation_county: acc.violation_county,
            }
        })
        .collect();

    // Stable: equal counts keep key order.
    buckets.sort_by(|a, b| b.ticket_count.cmp(&a.ticket_count));

    Aggregation {
        records_processed: processed,
        buckets,
    }
}

/// Aggregates every ticket in `store` and writes the bucket dataset to
/// `output_path`, replacing any previous file.
///
/// An empty store logs a warning and writes an empty dataset.
///
/// # Errors
///
/// Returns [`TransformError`] if reading the store or writing the dataset
/// fails.
pub fn aggregate_ticket_counts(
    store: &TicketStore,
    output_path: &Path,
    min_samples: u64,
) -> Result<AggregationResult, TransformError> {
    let records = store.stream_records(None)?;
    if records.is_empty() {
        log::warn!("No data found in raw_tickets table; writing an empty aggregate");
    } else {
        log::info!("Aggregating {} stored tickets", records.len());
    }

    let aggregation = aggregate_records(&records, min_samples);
    log::debug!(
        "{} of {} tickets placed on a segment",
        aggregation.records_processed,
        records.len()
    );

    write_segment_time_counts(output_path, &aggregation.buckets)?;
    log::info!(
        "Wrote aggregated dataset to {} ({} rows)",
        output_path.display(),
        aggregation.buckets.len()
    );

    Ok(AggregationResult {
        records_processed: aggregation.records_processed,
        records_output: aggregation.buckets.len() as u64,
        output_path: output_path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use parking_map_ticket_models::RawPayload;

    use super::*;

    fn ticket(key: &str, date: &str, time: &str, ticket_type: Option<&str>) -> TicketRecord {
        TicketRecord {
            summons_number: key.to_string(),
            issue_date: Some(date.to_string()),
            violation_time: Some(time.to_string()),
            ticket_type: ticket_type.map(str::to_string),
            violation_county: Some("BK".to_string()),
            street_name: Some("5 AVE".to_string()),
            intersecting_street_1: Some(String::new()),
            intersecting_street_2: Some(String::new()),
            ..TicketRecord::default()
        }
    }

    #[test]
    fn groups_by_segment_day_hour_and_type() {
        let records = vec![
            ticket("1", "2023-01-02", "0900", Some("P")),
            ticket("2", "2023-01-02", "0905", Some("P")),
            ticket("3", "2023-01-02", "1400", Some("P")),
        ];
        let agg = aggregate_records(&records, 1);

        assert_eq!(agg.records_processed, 3);
        assert_eq!(agg.buckets.len(), 2);
        assert_eq!(agg.buckets[0].segment_id, "BK | 5 AVE |  | ");
        assert_eq!(agg.buckets[0].day_of_week, DayOfWeek::Monday);
        assert_eq!(agg.buckets[0].hour_of_day, 9);
        assert_eq!(agg.buckets[0].ticket_count, 2);
        assert_eq!(agg.buckets[1].hour_of_day, 14);
        assert_eq!(agg.buckets[1].ticket_count, 1);
    }

    #[test]
    fn missing_ticket_type_is_its_own_group() {
        let records = vec![
            ticket("1", "2023-01-02", "0900", Some("P")),
            ticket("2", "2023-01-02", "0900", None),
        ];
        let agg = aggregate_records(&records, 1);
        assert_eq!(agg.buckets.len(), 2);
        // Equal counts: missing type sorts first.
        assert_eq!(agg.buckets[0].ticket_type, None);
        assert_eq!(agg.buckets[1].ticket_type.as_deref(), Some("P"));
    }

    #[test]
    fn min_samples_threshold() {
        let records: Vec<TicketRecord> = (0..5)
            .map(|i| ticket(&i.to_string(), "2023-01-02", "0900", Some("P")))
            .collect();

        assert_eq!(aggregate_records(&records[..4], 5).buckets.len(), 0);
        let agg = aggregate_records(&records, 5);
        assert_eq!(agg.buckets.len(), 1);
        assert_eq!(agg.buckets[0].ticket_count, 5);
    }

    #[test]
    fn zero_min_samples_acts_as_one() {
        let records = vec![ticket("1", "2023-01-02", "0900", Some("P"))];
        assert_eq!(aggregate_records(&records, 0).buckets.len(), 1);
    }

    #[test]
    fn drops_unparseable_and_unlocatable_records() {
        let mut no_street = ticket("2", "2023-01-02", "0900", Some("P"));
        no_street.street_name = None;
        let mut no_borough = ticket("3", "2023-01-02", "0900", Some("P"));
        no_borough.violation_county = None;
        let records = vec![
            ticket("1", "garbage", "0900", Some("P")),
            no_street,
            no_borough,
            ticket("4", "2023-01-02", "0900", Some("P")),
        ];

        let agg = aggregate_records(&records, 1);
        assert_eq!(agg.records_processed, 1);
        assert_eq!(agg.buckets[0].ticket_count, 1);
    }

    #[test]
    fn keeps_blank_but_present_locations() {
        let mut blank = ticket("1", "2023-01-02", "0900", Some("P"));
        blank.violation_county = Some(String::new());
        blank.street_name = Some(" ".to_string());

        let agg = aggregate_records(&[blank], 1);
        assert_eq!(agg.records_processed, 1);
        assert_eq!(agg.buckets[0].segment_id, " |  |  | ");
    }

    #[test]
    fn coordinate_means_skip_missing_values() {
        let mut a = ticket("1", "2023-01-02", "0900", Some("P"));
        a.latitude = Some(40.0);
        a.longitude = Some(-73.0);
        let mut b = ticket("2", "2023-01-02", "0900", Some("P"));
        b.latitude = Some(42.0);
        let c = ticket("3", "2023-01-02", "0900", Some("P"));

        let agg = aggregate_records(&[a, b, c], 1);
        let bucket = &agg.buckets[0];
        assert_eq!(bucket.ticket_count, 3);
        assert!((bucket.avg_latitude.unwrap() - 41.0).abs() < f64::EPSILON);
        assert!((bucket.avg_longitude.unwrap() - -73.0).abs() < f64::EPSILON);

        let none = aggregate_records(&[ticket("9", "2023-01-02", "0900", None)], 1);
        assert_eq!(none.buckets[0].avg_latitude, None);
    }

    #[test]
    fn representative_strings_are_first_seen() {
        let mut a = ticket("1", "2023-01-02", "0900", Some("P"));
        a.street_name = Some("5 ave".to_string());
        a.intersecting_street_1 = None;
        let mut b = ticket("2", "2023-01-02", "0900", Some("P"));
        b.street_name = Some("5 AVE ".to_string());
        b.intersecting_street_1 = Some("  ".to_string());

        let agg = aggregate_records(&[a, b], 1);
        let bucket = &agg.buckets[0];
        assert_eq!(bucket.ticket_count, 2);
        assert_eq!(bucket.street_name.as_deref(), Some("5 ave"));
        assert_eq!(bucket.intersecting_street_1.as_deref(), Some("  "));
    }

    #[test]
    fn ranks_by_count_descending() {
        let mut records = vec![ticket("a", "2023-01-02", "0100", Some("P"))];
        records.extend((0..3).map(|i| ticket(&format!("b{i}"), "2023-01-03", "0200", Some("P"))));
        records.extend((0..2).map(|i| ticket(&format!("c{i}"), "2023-01-04", "0300", Some("P"))));

        let counts: Vec<u64> = aggregate_records(&records, 1)
            .buckets
            .iter()
            .map(|b| b.ticket_count)
            .collect();
        assert_eq!(counts, vec![3, 2, 1]);
    }

    #[test]
    fn rerun_is_identical() {
        let records: Vec<TicketRecord> = (0..20)
            .map(|i| {
                ticket(
                    &format!("{i:03}"),
                    "2023-01-02",
                    &format!("{:02}00", i % 4),
                    Some(if i % 3 == 0 { "P" } else { "C" }),
                )
            })
            .collect();
        assert_eq!(aggregate_records(&records, 1), aggregate_records(&records, 1));
    }

    fn payload(value: serde_json::Value) -> RawPayload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn writes_dataset_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("derived/segment_time_counts.parquet");
        let mut store = TicketStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
            .upsert_records(&[
                payload(serde_json::json!({
                    "summons_number": "1",
                    "issue_date": "2023-01-02",
                    "violation_time": "0900A",
                    "violation_county": "BK",
                    "street_name": "5 AVE",
                    "ticket_type": "P",
                })),
                payload(serde_json::json!({
                    "summons_number": "2",
                    "issue_date": "not a date",
                    "violation_county": "BK",
                    "street_name": "5 AVE",
                })),
            ])
            .unwrap();

        let result = aggregate_ticket_counts(&store, &output, 1).unwrap();
        assert_eq!(result.records_processed, 1);
        assert_eq!(result.records_output, 1);
        assert_eq!(result.output_path, output);

        let rows = parking_map_database::datasets::read_segment_time_counts(&output).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hour_of_day, 9);
    }

    #[test]
    fn empty_store_writes_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("counts.parquet");
        let store = TicketStore::open_in_memory().unwrap();
        store.initialize().unwrap();

        let result = aggregate_ticket_counts(&store, &output, DEFAULT_MIN_SAMPLES).unwrap();
        assert_eq!(result.records_processed, 0);
        assert_eq!(result.records_output, 0);
        assert!(output.exists());
    }
}
