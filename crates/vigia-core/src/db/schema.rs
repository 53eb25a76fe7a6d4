//! SQLite schema for the snapshot store.
//!
//! - `integration_rows` holds the merged rows of the latest upload, one per
//!   (status, event_date, category, parent_type)
//! - `store_meta` is a single-row table describing that upload

/// Migration v1: snapshot table, date index and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS integration_rows (
    status TEXT NOT NULL,
    event_date TEXT NOT NULL CHECK (length(event_date) = 10),
    category TEXT NOT NULL,
    parent_type TEXT NOT NULL DEFAULT '',
    qtd INTEGER NOT NULL CHECK (qtd >= 0),
    PRIMARY KEY (status, event_date, category, parent_type)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_integration_rows_event_date
    ON integration_rows(event_date);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_replace_at_us INTEGER NOT NULL DEFAULT 0,
    rows_received INTEGER NOT NULL DEFAULT 0,
    rows_written INTEGER NOT NULL DEFAULT 0,
    source TEXT,
    variant TEXT
);

INSERT OR IGNORE INTO store_meta (
    id,
    schema_version,
    last_replace_at_us,
    rows_received,
    rows_written,
    source,
    variant
) VALUES (1, 1, 0, 0, 0, NULL, NULL);
";

/// Indexes expected by the read path.
pub const REQUIRED_INDEXES: &[&str] = &["idx_integration_rows_event_date"];
