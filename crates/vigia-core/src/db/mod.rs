//! SQLite snapshot store.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so report readers are not blocked by an ingest
//! - `busy_timeout = 5s` to ride out a concurrent writer
//! - `synchronous = NORMAL`, durable at WAL checkpoints

pub mod migrations;
pub mod schema;
pub mod store;

pub use store::{
    ReplaceInfo, ReplaceSummary, Store, UploadMeta, load_all_or_empty, try_open_store,
};

use crate::error::StoreError;
use rusqlite::Connection;
use std::{path::Path, time::Duration};

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default store location relative to the project root.
pub const DEFAULT_STORE_PATH: &str = ".vigia/vigia.db";

/// Open (or create) the store database, apply runtime pragmas, and migrate
/// the schema to the latest version.
///
/// # Errors
///
/// Returns [`StoreError::CreateDir`] if the parent directory cannot be
/// created and [`StoreError::Unavailable`] if opening, configuring or
/// migrating fails.
pub fn open_database(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let unavailable = |source| StoreError::Unavailable {
        path: path.to_path_buf(),
        source,
    };

    let mut conn = Connection::open(path).map_err(unavailable)?;
    configure_connection(&conn).map_err(unavailable)?;
    migrations::migrate(&mut conn).map_err(unavailable)?;

    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, open_database};
    use crate::db::migrations;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested/vigia.db");
        (dir, path)
    }

    #[test]
    fn open_database_sets_wal_and_busy_timeout() {
        let (_dir, path) = temp_db_path();
        let conn = open_database(&path).expect("open store db");

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(
            u128::from(busy_timeout_ms),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );
    }

    #[test]
    fn open_database_creates_parents_and_migrates() {
        let (_dir, path) = temp_db_path();
        let conn = open_database(&path).expect("open store db");
        assert!(path.exists());

        let version = migrations::current_schema_version(&conn).expect("schema version query");
        assert_eq!(version, migrations::LATEST_SCHEMA_VERSION);
    }
}
