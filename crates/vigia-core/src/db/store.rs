//! Replace-all snapshot persistence.
//!
//! Every upload replaces the whole table: candidate rows are merged by key,
//! then the delete and the inserts run in one transaction so a reader sees
//! either the previous snapshot or the new one.

use super::open_database;
use crate::error::StoreError;
use crate::model::{IntegrationRecord, merge_by_key};
use crate::normalize::SchemaVariant;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Format of `event_date` in the table.
const STORED_DATE_FORMAT: &str = "%Y-%m-%d";

/// Row counts produced by one replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaceSummary {
    /// Rows persisted after merging duplicate keys.
    pub rows_written: usize,
    /// Candidate rows handed to the store.
    pub rows_received: usize,
}

impl ReplaceSummary {
    /// Input rows folded into another row with the same key.
    #[must_use]
    pub const fn duplicates_collapsed(&self) -> usize {
        self.rows_received.saturating_sub(self.rows_written)
    }
}

/// Descriptive metadata recorded alongside an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMeta {
    /// Where the rows came from, usually the input file name.
    pub source: Option<String>,
    /// Schema variant the rows were normalized with.
    pub variant: Option<String>,
}

/// Metadata about the snapshot currently in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaceInfo {
    pub replaced_at: DateTime<Utc>,
    pub rows_received: usize,
    pub rows_written: usize,
    pub source: Option<String>,
    pub variant: Option<String>,
}

impl ReplaceInfo {
    /// Variant recorded for the upload, if it names a known one.
    #[must_use]
    pub fn schema_variant(&self) -> Option<SchemaVariant> {
        self.variant.as_deref().and_then(|raw| raw.parse().ok())
    }
}

/// Handle on the snapshot database.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    ///
    /// See [`open_database`].
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            conn: open_database(path)?,
        })
    }

    /// In-memory store, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate or migrate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        super::migrations::migrate(&mut conn)?;
        Ok(Self { conn })
    }

    /// Replace the snapshot with `records`, merging rows that share a key.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the previous snapshot is left
    /// intact in that case.
    pub fn replace_all(&mut self, records: &[IntegrationRecord]) -> Result<ReplaceSummary, StoreError> {
        self.replace_all_with(records, &UploadMeta::default())
    }

    /// [`Store::replace_all`] that also records upload metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if a merged count exceeds `i64::MAX` or any statement
    /// fails; nothing is changed in either case.
    pub fn replace_all_with(
        &mut self,
        records: &[IntegrationRecord],
        meta: &UploadMeta,
    ) -> Result<ReplaceSummary, StoreError> {
        let merged = merge_by_key(records);
        let summary = ReplaceSummary {
            rows_written: merged.len(),
            rows_received: records.len(),
        };

        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM integration_rows", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO integration_rows (status, event_date, category, parent_type, qtd)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in &merged {
                let qtd = i64::try_from(record.count).map_err(|_| StoreError::CountOutOfRange {
                    status: record.status.clone(),
                    event_date: record.event_date,
                    count: record.count,
                })?;
                insert.execute(params![
                    record.status,
                    record.event_date.format(STORED_DATE_FORMAT).to_string(),
                    record.category,
                    record.parent_type.as_deref().unwrap_or(""),
                    qtd,
                ])?;
            }
        }
        tx.execute(
            "UPDATE store_meta
             SET last_replace_at_us = ?1,
                 rows_received = ?2,
                 rows_written = ?3,
                 source = ?4,
                 variant = ?5
             WHERE id = 1",
            params![
                Utc::now().timestamp_micros(),
                to_sql_count(summary.rows_received),
                to_sql_count(summary.rows_written),
                meta.source,
                meta.variant,
            ],
        )?;
        tx.commit()?;

        info!(
            deleted,
            rows_received = summary.rows_received,
            rows_written = summary.rows_written,
            "replaced store snapshot"
        );
        Ok(summary)
    }

    /// Every row in the store, ordered by (event_date, status, category,
    /// parent_type). Dates are parsed from the stored text on each call;
    /// rows whose date no longer parses are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn load_all(&self) -> Result<Vec<IntegrationRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT status, event_date, category, parent_type, qtd
             FROM integration_rows
             ORDER BY event_date, status, category, parent_type",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(StoredRow {
                status: row.get(0)?,
                event_date: row.get(1)?,
                category: row.get(2)?,
                parent_type: row.get(3)?,
                qtd: row.get(4)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            let row = row?;
            let Ok(event_date) = NaiveDate::parse_from_str(&row.event_date, STORED_DATE_FORMAT)
            else {
                warn!(event_date = %row.event_date, "skipping stored row with invalid date");
                continue;
            };
            records.push(IntegrationRecord {
                status: row.status,
                event_date,
                category: row.category,
                parent_type: (!row.parent_type.is_empty()).then_some(row.parent_type),
                count: u64::try_from(row.qtd).unwrap_or(0),
            });
        }

        debug!(rows = records.len(), "loaded store snapshot");
        Ok(records)
    }

    /// Number of rows in the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn row_count(&self) -> Result<usize, StoreError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM integration_rows", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Metadata of the last replace, or `None` if nothing was ever uploaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn last_replace(&self) -> Result<Option<ReplaceInfo>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT last_replace_at_us, rows_received, rows_written, source, variant
                 FROM store_meta
                 WHERE id = 1 AND last_replace_at_us > 0",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.and_then(|(at_us, received, written, source, variant)| {
            Some(ReplaceInfo {
                replaced_at: DateTime::from_timestamp_micros(at_us)?,
                rows_received: usize::try_from(received).unwrap_or(0),
                rows_written: usize::try_from(written).unwrap_or(0),
                source,
                variant,
            })
        }))
    }
}

struct StoredRow {
    status: String,
    event_date: String,
    category: String,
    parent_type: String,
    qtd: i64,
}

fn to_sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Open an existing store for reading.
///
/// A missing file is the normal first-run state and returns `None`; a file
/// that cannot be opened is logged and also returns `None`.
#[must_use]
pub fn try_open_store(path: &Path) -> Option<Store> {
    if !path.exists() {
        debug!(path = %path.display(), "store not created yet");
        return None;
    }

    match Store::open(path) {
        Ok(store) => Some(store),
        Err(error) => {
            warn!(
                path = %path.display(),
                %error,
                "store unavailable, treating as empty"
            );
            None
        }
    }
}

/// Full dataset for a render pass. Store failures on read degrade to an
/// empty dataset.
#[must_use]
pub fn load_all_or_empty(path: &Path) -> Vec<IntegrationRecord> {
    let Some(store) = try_open_store(path) else {
        return Vec::new();
    };

    store.load_all().unwrap_or_else(|error| {
        warn!(path = %path.display(), %error, "failed to read store, treating as empty");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
    }

    fn scenario() -> Vec<IntegrationRecord> {
        vec![
            IntegrationRecord::new("sucesso", day("2024-01-01"), "X", 10),
            IntegrationRecord::new("erro", day("2024-01-01"), "X", 5),
            IntegrationRecord::new("erro", day("2024-01-01"), "X", 5),
        ]
    }

    #[test]
    fn replace_merges_duplicates_and_reports_counts() {
        let mut store = Store::open_in_memory().expect("store");
        let summary = store.replace_all(&scenario()).expect("replace");
        assert_eq!(summary.rows_received, 3);
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.duplicates_collapsed(), 1);

        let rows = store.load_all().expect("load");
        let erro = rows.iter().find(|r| r.status == "erro").expect("erro row");
        assert_eq!(erro.count, 10);
        assert_eq!(erro.event_date, day("2024-01-01"));
    }

    #[test]
    fn replace_discards_previous_snapshot() {
        let mut store = Store::open_in_memory().expect("store");
        store.replace_all(&scenario()).expect("first replace");
        store
            .replace_all(&[IntegrationRecord::new("ok", day("2024-02-01"), "Y", 1)])
            .expect("second replace");

        let rows = store.load_all().expect("load");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category, "Y");
    }

    #[test]
    fn replace_is_idempotent() {
        let mut store = Store::open_in_memory().expect("store");
        store.replace_all(&scenario()).expect("first");
        let once = store.load_all().expect("load once");
        store.replace_all(&scenario()).expect("second");
        assert_eq!(store.load_all().expect("load twice"), once);
    }

    #[test]
    fn parent_type_round_trips() {
        let mut store = Store::open_in_memory().expect("store");
        store
            .replace_all(&[
                IntegrationRecord::new("erro", day("2024-01-01"), "nfe", 2).with_parent_type("fiscal"),
                IntegrationRecord::new("erro", day("2024-01-01"), "nfe", 3),
            ])
            .expect("replace");

        let rows = store.load_all().expect("load");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.parent_type.as_deref() == Some("fiscal") && r.count == 2));
        assert!(rows.iter().any(|r| r.parent_type.is_none() && r.count == 3));
    }

    #[test]
    fn oversized_count_fails_without_touching_snapshot() {
        let mut store = Store::open_in_memory().expect("store");
        store.replace_all(&scenario()).expect("seed");

        let err = store
            .replace_all(&[IntegrationRecord::new("erro", day("2024-01-02"), "X", u64::MAX)])
            .expect_err("count too large");
        assert!(matches!(err, StoreError::CountOutOfRange { .. }));
        assert_eq!(store.row_count().expect("count"), 2);
    }

    #[test]
    fn load_skips_rows_with_corrupt_dates() {
        let store = Store::open_in_memory().expect("store");
        store
            .conn
            .execute(
                "INSERT INTO integration_rows (status, event_date, category, parent_type, qtd)
                 VALUES ('erro', '2024-99-99', 'X', '', 1), ('ok', '2024-01-01', 'X', '', 2)",
                [],
            )
            .expect("seed raw rows");

        let rows = store.load_all().expect("load");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "ok");
    }

    #[test]
    fn last_replace_is_none_before_first_upload() {
        let store = Store::open_in_memory().expect("store");
        assert!(store.last_replace().expect("meta").is_none());
        assert_eq!(store.row_count().expect("count"), 0);
    }

    #[test]
    fn last_replace_records_upload_meta() {
        let mut store = Store::open_in_memory().expect("store");
        store
            .replace_all_with(
                &scenario(),
                &UploadMeta {
                    source: Some("export.csv".to_string()),
                    variant: Some("basic".to_string()),
                },
            )
            .expect("replace");

        let info = store.last_replace().expect("meta").expect("meta present");
        assert_eq!(info.rows_received, 3);
        assert_eq!(info.rows_written, 2);
        assert_eq!(info.source.as_deref(), Some("export.csv"));
        assert_eq!(info.variant.as_deref(), Some("basic"));
    }

    #[test]
    fn recorded_variant_parses_back() {
        let mut store = Store::open_in_memory().expect("store");
        store
            .replace_all_with(
                &scenario(),
                &UploadMeta {
                    source: None,
                    variant: Some(SchemaVariant::ParentType.to_string()),
                },
            )
            .expect("replace");
        let info = store.last_replace().expect("meta").expect("meta present");
        assert_eq!(info.schema_variant(), Some(SchemaVariant::ParentType));

        store
            .replace_all_with(&scenario(), &UploadMeta::default())
            .expect("replace");
        let info = store.last_replace().expect("meta").expect("meta present");
        assert_eq!(info.schema_variant(), None);
    }

    #[test]
    fn out_of_range_years_do_not_abort_the_upload() {
        let input = "qtd,status,data_integracao,tipo\n\
                     1,ok,2024-01-01,X\n\
                     1,erro,+12345-01-01,X\n\
                     1,erro,-0001-01-01,X\n\
                     1,erro,0000-01-01,X\n";
        let records = crate::normalize::Normalizer::default()
            .normalize(input)
            .expect("normalize");
        assert_eq!(records.len(), 1);

        let mut store = Store::open_in_memory().expect("store");
        let summary = store.replace_all(&records).expect("replace");
        assert_eq!(summary.rows_written, 1);
        assert_eq!(store.load_all().expect("load")[0].event_date, day("2024-01-01"));
    }

    #[test]
    fn missing_store_reads_as_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent.db");
        assert!(try_open_store(&path).is_none());
        assert!(load_all_or_empty(&path).is_empty());
        assert!(!path.exists(), "reading must not create the store");
    }

    #[test]
    fn unreadable_store_reads_as_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, vec![b'x'; 4096]).expect("write");
        assert!(load_all_or_empty(&path).is_empty());
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("vigia.db");
        {
            let mut store = Store::open(&path).expect("open");
            store.replace_all(&scenario()).expect("replace");
        }
        let reopened = load_all_or_empty(&path);
        assert_eq!(reopened.len(), 2);
    }
}
