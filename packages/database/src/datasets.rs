//! Parquet I/O for the derived segment datasets.
//!
//! Rows are staged in an in-memory `DuckDB` table and exported with
//! `COPY ... TO ... (FORMAT PARQUET)`. Reads go through `read_parquet()`.
//! Every write replaces the target file in full: the export lands in a
//! sibling temp file that is renamed over the target once complete.

use std::path::{Path, PathBuf};

use duckdb::Connection;
use duckdb::types::Type;
use parking_map_ticket_models::{DayOfWeek, SegmentBucket, SegmentSummary};

use crate::DbError;

/// Columns of the aggregate dataset, in file order.
pub const SEGMENT_TIME_COUNT_COLUMNS: &[&str] = &[
    "segment_id",
    "day_of_week",
    "hour_of_day",
    "ticket_type",
    "ticket_count",
    "avg_latitude",
    "avg_longitude",
    "street_name",
    "intersecting_street_1",
    "intersecting_street_2",
    "violation_county",
];

/// Columns of the summary dataset, in file order.
pub const SEGMENT_SUMMARY_COLUMNS: &[&str] = &[
    "segment_id",
    "total_tickets",
    "borough",
    "street_name",
    "intersecting_street_1",
    "intersecting_street_2",
    "latitude",
    "longitude",
    "ticket_types",
];

/// Presence and size of a dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetStatus {
    /// The file does not exist yet.
    Missing,
    /// The file exists but holds no rows.
    Empty,
    /// The file holds this many rows.
    Rows(u64),
}

impl std::fmt::Display for DatasetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => f.write_str("not built yet"),
            Self::Empty => f.write_str("no rows"),
            Self::Rows(n) => write!(f, "{n} rows"),
        }
    }
}

/// Writes the aggregate dataset to `path`, preserving slice order.
///
/// # Errors
///
/// Returns [`DbError`] if staging or the Parquet export fails.
pub fn write_segment_time_counts(path: &Path, buckets: &[SegmentBucket]) -> Result<(), DbError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(
        "CREATE TABLE staged (
            row_idx BIGINT NOT NULL,
            segment_id TEXT NOT NULL,
            day_of_week TEXT NOT NULL,
            hour_of_day INTEGER NOT NULL,
            ticket_type TEXT,
            ticket_count BIGINT NOT NULL,
            avg_latitude DOUBLE,
            avg_longitude DOUBLE,
            street_name TEXT,
            intersecting_street_1 TEXT,
            intersecting_street_2 TEXT,
            violation_county TEXT
        );",
    )?;

    {
        let mut stmt = conn.prepare(
            "INSERT INTO staged VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for (i, bucket) in buckets.iter().enumerate() {
            stmt.execute(duckdb::params![
                to_i64(i as u64)?,
                bucket.segment_id,
                bucket.day_of_week.to_string(),
                i32::from(bucket.hour_of_day),
                bucket.ticket_type,
                to_i64(bucket.ticket_count)?,
                bucket.avg_latitude,
                bucket.avg_longitude,
                bucket.street_name,
                bucket.intersecting_street_1,
                bucket.intersecting_street_2,
                bucket.violation_county,
            ])?;
        }
    }

    export(&conn, SEGMENT_TIME_COUNT_COLUMNS, path)?;
    log::debug!("Wrote {} bucket rows to {}", buckets.len(), path.display());
    Ok(())
}

/// Reads the aggregate dataset from `path` in file order.
///
/// # Errors
///
/// Returns [`DbError::MissingInput`] if the file does not exist, or another
/// [`DbError`] if it cannot be read.
pub fn read_segment_time_counts(path: &Path) -> Result<Vec<SegmentBucket>, DbError> {
    let conn = open_for_read(path)?;
    let sql = format!(
        "SELECT {} FROM read_parquet({})",
        SEGMENT_TIME_COUNT_COLUMNS.join(", "),
        sql_string(path)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        let day: String = row.get(1)?;
        let hour: i32 = row.get(2)?;
        let count: i64 = row.get(4)?;
        Ok(SegmentBucket {
            segment_id: row.get(0)?,
            day_of_week: day.parse::<DayOfWeek>().map_err(|e| {
                duckdb::Error::FromSqlConversionFailure(1, Type::Text, e.to_string().into())
            })?,
            hour_of_day: u8::try_from(hour).map_err(|e| {
                duckdb::Error::FromSqlConversionFailure(2, Type::Int, Box::new(e))
            })?,
            ticket_type: row.get(3)?,
            ticket_count: u64::try_from(count).map_err(|e| {
                duckdb::Error::FromSqlConversionFailure(4, Type::BigInt, Box::new(e))
            })?,
            avg_latitude: row.get(5)?,
            avg_longitude: row.get(6)?,
            street_name: row.get(7)?,
            intersecting_street_1: row.get(8)?,
            intersecting_street_2: row.get(9)?,
            violation_county: row.get(10)?,
        })
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Writes the summary dataset to `path`, preserving slice order.
///
/// # Errors
///
/// Returns [`DbError`] if staging or the Parquet export fails.
pub fn write_segment_summaries(path: &Path, summaries: &[SegmentSummary]) -> Result<(), DbError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(
        "CREATE TABLE staged (
            row_idx BIGINT NOT NULL,
            segment_id TEXT NOT NULL,
            total_tickets BIGINT NOT NULL,
            borough TEXT,
            street_name TEXT,
            intersecting_street_1 TEXT,
            intersecting_street_2 TEXT,
            latitude DOUBLE,
            longitude DOUBLE,
            ticket_types TEXT NOT NULL
        );",
    )?;

    {
        let mut stmt = conn.prepare("INSERT INTO staged VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)")?;
        for (i, summary) in summaries.iter().enumerate() {
            stmt.execute(duckdb::params![
                to_i64(i as u64)?,
                summary.segment_id,
                to_i64(summary.total_tickets)?,
                summary.borough,
                summary.street_name,
                summary.intersecting_street_1,
                summary.intersecting_street_2,
                summary.latitude,
                summary.longitude,
                summary.ticket_types,
            ])?;
        }
    }

    export(&conn, SEGMENT_SUMMARY_COLUMNS, path)?;
    log::debug!(
        "Wrote {} summary rows to {}",
        summaries.len(),
        path.display()
    );
    Ok(())
}

/// Reads the summary dataset from `path` in file order.
///
/// # Errors
///
/// Returns [`DbError::MissingInput`] if the file does not exist, or another
/// [`DbError`] if it cannot be read.
pub fn read_segment_summaries(path: &Path) -> Result<Vec<SegmentSummary>, DbError> {
    let conn = open_for_read(path)?;
    let sql = format!(
        "SELECT {} FROM read_parquet({})",
        SEGMENT_SUMMARY_COLUMNS.join(", "),
        sql_string(path)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        let total: i64 = row.get(1)?;
        Ok(SegmentSummary {
            segment_id: row.get(0)?,
            total_tickets: u64::try_from(total).map_err(|e| {
                duckdb::Error::FromSqlConversionFailure(1, Type::BigInt, Box::new(e))
            })?,
            borough: row.get(2)?,
            street_name: row.get(3)?,
            intersecting_street_1: row.get(4)?,
            intersecting_street_2: row.get(5)?,
            latitude: row.get(6)?,
            longitude: row.get(7)?,
            ticket_types: row.get(8)?,
        })
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Probes a dataset file without loading its rows.
///
/// # Errors
///
/// Returns [`DbError`] if the file exists but is not readable Parquet.
pub fn dataset_status(path: &Path) -> Result<DatasetStatus, DbError> {
    if !path.exists() {
        return Ok(DatasetStatus::Missing);
    }
    let conn = Connection::open_in_memory()?;
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM read_parquet({})", sql_string(path)),
        [],
        |row| row.get(0),
    )?;

    Ok(match u64::try_from(count).unwrap_or(0) {
        0 => DatasetStatus::Empty,
        n => DatasetStatus::Rows(n),
    })
}

fn open_for_read(path: &Path) -> Result<Connection, DbError> {
    if !path.exists() {
        return Err(DbError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    Ok(Connection::open_in_memory()?)
}

/// Exports the `staged` table in `row_idx` order, then renames the result
/// over `path`.
fn export(conn: &Connection, columns: &[&str], path: &Path) -> Result<(), DbError> {
    crate::paths::ensure_parent(path)?;
    let tmp = temp_path(path);
    if tmp.exists() {
        std::fs::remove_file(&tmp)?;
    }

    conn.execute_batch(&format!(
        "COPY (SELECT {} FROM staged ORDER BY row_idx) TO {} (FORMAT PARQUET);",
        columns.join(", "),
        sql_string(&tmp)
    ))?;

    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Renders a path as a single-quoted SQL string literal.
fn sql_string(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "''"))
}

fn to_i64(value: u64) -> Result<i64, DbError> {
    i64::try_from(value).map_err(|e| DbError::Conversion {
        message: format!("{value} does not fit in BIGINT: {e}"),
    })
}
