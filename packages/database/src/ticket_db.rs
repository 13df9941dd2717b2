//! Raw ticket storage in an embedded `DuckDB` file.
//!
//! The `raw_tickets` table holds one row per summons number: the known
//! columns from [`RAW_COLUMNS`] plus the verbatim JSON payload. Writes are
//! keyed upserts, so re-ingesting the same records never duplicates rows.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use duckdb::Connection;
use parking_map_ticket_models::{
    ColumnKind, NATURAL_KEY, PAYLOAD_COLUMN, RAW_COLUMNS, RawPayload, TicketRecord, payload_key,
    payload_number, payload_text,
};

use crate::DbError;

/// Name of the raw ticket table.
pub const RAW_TABLE: &str = "raw_tickets";

/// Number of rows per INSERT chunk.
const CHUNK_SIZE: usize = 1_000;

/// Columns read back into a [`TicketRecord`], in field order.
const RECORD_COLUMNS: &[&str] = &[
    NATURAL_KEY,
    "issue_date",
    "violation_time",
    "violation_code",
    "violation_description",
    "ticket_type",
    "violation_county",
    "street_name",
    "intersecting_street_1",
    "intersecting_street_2",
    "latitude",
    "longitude",
    "fine_amount",
    "amount_due",
    "penalty_amount",
    "interest_amount",
    "reduction_amount",
    "payment_amount",
    "precinct",
    "issuing_agency",
    PAYLOAD_COLUMN,
];

/// Keyed store of raw parking tickets.
pub struct TicketStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl TicketStore {
    /// Opens (or creates) the store at `path`. The parent directory is
    /// created if missing.
    ///
    /// The table is not created here; call [`Self::initialize`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory or connection cannot be created.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        crate::paths::ensure_parent(path)?;
        let conn = Connection::open(path)?;
        log::debug!("Opened ticket store at {}", path.display());
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection cannot be created.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    /// Backing file, or `None` for an in-memory store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Creates the `raw_tickets` table if it does not exist. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the DDL fails.
    pub fn initialize(&self) -> Result<(), DbError> {
        self.conn.execute_batch(&create_table_sql())?;
        Ok(())
    }

    /// Upserts a batch of raw payloads keyed by summons number.
    ///
    /// The whole batch is written in one transaction. Duplicate keys within
    /// the batch collapse to their last occurrence; payloads without a key
    /// are skipped. An existing row with the same key is replaced in full.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any write fails. Nothing from the batch is
    /// committed in that case.
    pub fn upsert_records(&mut self, records: &[RawPayload]) -> Result<u64, DbError> {
        if records.is_empty() {
            return Ok(0);
        }

        // Deduplicate within the batch: keep last occurrence of each key
        let mut last_seen: BTreeMap<String, usize> = BTreeMap::new();
        let mut skipped = 0usize;
        for (i, record) in records.iter().enumerate() {
            match payload_key(record) {
                Some(key) => {
                    last_seen.insert(key, i);
                }
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {skipped} record(s) without a {NATURAL_KEY}");
        }

        let mut deduped: Vec<(usize, String)> =
            last_seen.into_iter().map(|(key, i)| (i, key)).collect();
        deduped.sort_unstable_by_key(|(i, _)| *i);

        let keyed = records.len() - skipped;
        if deduped.len() < keyed {
            log::info!(
                "Deduplicated INSERT batch: {keyed} -> {} rows ({} duplicates removed)",
                deduped.len(),
                keyed - deduped.len(),
            );
        }

        if deduped.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut written = 0u64;

        for chunk in deduped.chunks(CHUNK_SIZE) {
            let sql = upsert_sql(chunk.len());
            let mut stmt = tx.prepare(&sql)?;
            let mut param_idx = 1usize;

            for (i, key) in chunk {
                let record = &records[*i];
                for (column, kind) in RAW_COLUMNS {
                    if *column == NATURAL_KEY {
                        stmt.raw_bind_parameter(param_idx, key.as_str())?;
                    } else {
                        match kind {
                            ColumnKind::Text => {
                                stmt.raw_bind_parameter(param_idx, payload_text(record, column))?;
                            }
                            ColumnKind::Double => {
                                stmt.raw_bind_parameter(
                                    param_idx,
                                    payload_number(record, column),
                                )?;
                            }
                        }
                    }
                    param_idx += 1;
                }
                let payload = serde_json::Value::Object(record.clone()).to_string();
                stmt.raw_bind_parameter(param_idx, payload)?;
                param_idx += 1;
            }

            stmt.raw_execute()?;
            written += chunk.len() as u64;
        }

        tx.commit()?;
        log::debug!("Upserted {written} ticket rows");

        Ok(written)
    }

    /// Reads stored tickets ordered by ascending summons number, optionally
    /// capped at `limit` rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn stream_records(&self, limit: Option<u64>) -> Result<Vec<TicketRecord>, DbError> {
        let mut sql = format!(
            "SELECT {} FROM {RAW_TABLE} ORDER BY {NATURAL_KEY}",
            RECORD_COLUMNS.join(", ")
        );
        let params: Vec<i64> = limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .into_iter()
            .collect();
        if !params.is_empty() {
            sql.push_str(" LIMIT ?");
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params_from_iter(params), |row| {
            Ok(TicketRecord {
                summons_number: row.get(0)?,
                issue_date: row.get(1)?,
                violation_time: row.get(2)?,
                violation_code: row.get(3)?,
                violation_description: row.get(4)?,
                ticket_type: row.get(5)?,
                violation_county: row.get(6)?,
                street_name: row.get(7)?,
                intersecting_street_1: row.get(8)?,
                intersecting_street_2: row.get(9)?,
                latitude: row.get(10)?,
                longitude: row.get(11)?,
                fine_amount: row.get(12)?,
                amount_due: row.get(13)?,
                penalty_amount: row.get(14)?,
                interest_amount: row.get(15)?,
                reduction_amount: row.get(16)?,
                payment_amount: row.get(17)?,
                precinct: row.get(18)?,
                issuing_agency: row.get(19)?,
                raw_payload: row.get(20)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Returns the number of stored tickets.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn record_count(&self) -> Result<u64, DbError> {
        let mut stmt = self.conn.prepare(&format!("SELECT COUNT(*) FROM {RAW_TABLE}"))?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        u64::try_from(count).map_err(|e| DbError::Conversion {
            message: format!("negative row count {count}: {e}"),
        })
    }
}

fn create_table_sql() -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {RAW_TABLE} (\n");
    for (column, kind) in RAW_COLUMNS {
        let constraint = if *column == NATURAL_KEY {
            " NOT NULL PRIMARY KEY"
        } else {
            ""
        };
        let _ = writeln!(sql, "    {column} {}{constraint},", kind.sql_type());
    }
    let _ = writeln!(sql, "    {PAYLOAD_COLUMN} TEXT NOT NULL");
    sql.push_str(");");
    sql
}

fn upsert_sql(rows: usize) -> String {
    let columns: Vec<&str> = RAW_COLUMNS
        .iter()
        .map(|(column, _)| *column)
        .chain(std::iter::once(PAYLOAD_COLUMN))
        .collect();

    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    let updates = columns
        .iter()
        .filter(|column| **column != NATURAL_KEY)
        .map(|column| format!("{column} = EXCLUDED.{column}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {RAW_TABLE} ({}) VALUES {} ON CONFLICT ({NATURAL_KEY}) DO UPDATE SET {updates}",
        columns.join(", "),
        vec![placeholders.as_str(); rows].join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(value: serde_json::Value) -> RawPayload {
        value.as_object().cloned().unwrap()
    }

    fn store() -> TicketStore {
        let store = TicketStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    #[test]
    fn initialize_is_idempotent() {
        let store = store();
        store.initialize().unwrap();
        assert_eq!(store.record_count().unwrap(), 0);
    }

    #[test]
    fn empty_batch_writes_nothing() {
        let mut store = store();
        assert_eq!(store.upsert_records(&[]).unwrap(), 0);
        assert_eq!(store.record_count().unwrap(), 0);
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let mut store = store();
        let first = payload(serde_json::json!({
            "summons_number": "1",
            "street_name": "5 AVE",
            "fine_amount": "65",
        }));
        let second = payload(serde_json::json!({
            "summons_number": "1",
            "street_name": "6 AVE",
        }));

        assert_eq!(store.upsert_records(&[first]).unwrap(), 1);
        assert_eq!(store.upsert_records(&[second]).unwrap(), 1);

        let rows = store.stream_records(None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].street_name.as_deref(), Some("6 AVE"));
        // Replaced in full: the old fine does not survive.
        assert_eq!(rows[0].fine_amount, None);
    }

    #[test]
    fn reingesting_same_batch_is_idempotent() {
        let mut store = store();
        let batch: Vec<RawPayload> = (0..3)
            .map(|i| payload(serde_json::json!({"summons_number": i.to_string()})))
            .collect();

        store.upsert_records(&batch).unwrap();
        store.upsert_records(&batch).unwrap();
        assert_eq!(store.record_count().unwrap(), 3);
    }

    #[test]
    fn duplicate_keys_in_batch_keep_last() {
        let mut store = store();
        let batch = vec![
            payload(serde_json::json!({"summons_number": "7", "ticket_type": "A"})),
            payload(serde_json::json!({"summons_number": "8", "ticket_type": "B"})),
            payload(serde_json::json!({"summons_number": "7", "ticket_type": "C"})),
        ];

        assert_eq!(store.upsert_records(&batch).unwrap(), 2);
        let rows = store.stream_records(None).unwrap();
        assert_eq!(rows[0].summons_number, "7");
        assert_eq!(rows[0].ticket_type.as_deref(), Some("C"));
    }

    #[test]
    fn keyless_records_are_skipped() {
        let mut store = store();
        let batch = vec![
            payload(serde_json::json!({"street_name": "NO KEY"})),
            payload(serde_json::json!({"summons_number": "  "})),
            payload(serde_json::json!({"summons_number": "9"})),
        ];
        assert_eq!(store.upsert_records(&batch).unwrap(), 1);
        assert_eq!(store.record_count().unwrap(), 1);
    }

    #[test]
    fn coerces_field_types_and_keeps_payload() {
        let mut store = store();
        let record = payload(serde_json::json!({
            "summons_number": 1_234_u64,
            "latitude": "40.5",
            "longitude": "unknown",
            "violation_code": 21,
            "custom_field": {"nested": true},
        }));
        store.upsert_records(&[record]).unwrap();

        let rows = store.stream_records(None).unwrap();
        let row = &rows[0];
        assert_eq!(row.summons_number, "1234");
        assert_eq!(row.latitude, Some(40.5));
        assert_eq!(row.longitude, None);
        assert_eq!(row.violation_code.as_deref(), Some("21"));

        let raw: serde_json::Value = serde_json::from_str(&row.raw_payload).unwrap();
        assert_eq!(raw["longitude"], "unknown");
        assert_eq!(raw["custom_field"]["nested"], true);
    }

    #[test]
    fn streams_in_key_order_with_limit() {
        let mut store = store();
        let batch: Vec<RawPayload> = ["c", "a", "b"]
            .iter()
            .map(|k| payload(serde_json::json!({"summons_number": k})))
            .collect();
        store.upsert_records(&batch).unwrap();

        let keys: Vec<String> = store
            .stream_records(None)
            .unwrap()
            .into_iter()
            .map(|r| r.summons_number)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        assert_eq!(store.stream_records(Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn writes_across_chunks() {
        let mut store = store();
        let batch: Vec<RawPayload> = (0..CHUNK_SIZE + 5)
            .map(|i| payload(serde_json::json!({"summons_number": format!("{i:06}")})))
            .collect();
        assert_eq!(store.upsert_records(&batch).unwrap(), batch.len() as u64);
        assert_eq!(store.record_count().unwrap(), batch.len() as u64);
    }

    #[test]
    fn file_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/tickets.duckdb");

        {
            let mut store = TicketStore::open(&path).unwrap();
            store.initialize().unwrap();
            store
                .upsert_records(&[payload(serde_json::json!({"summons_number": "1"}))])
                .unwrap();
        }

        let store = TicketStore::open(&path).unwrap();
        store.initialize().unwrap();
        assert_eq!(store.record_count().unwrap(), 1);
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn table_sql_lists_every_column() {
        let sql = create_table_sql();
        for (column, _) in RAW_COLUMNS {
            assert!(sql.contains(column));
        }
        assert!(sql.contains("summons_number TEXT NOT NULL PRIMARY KEY"));
        assert!(sql.contains("latitude DOUBLE"));
    }
}
