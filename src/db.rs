use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

pub fn open(path: &Path) -> Result<Connection> {
    info!("opening database at {}", path.display());
    let conn = Connection::open(path)?;

    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    migrate(&conn)?;
    Ok(conn)
}

/// Run database migrations. Exposed for tests that use in-memory DBs.
pub(crate) fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Question answering history
        CREATE TABLE IF NOT EXISTS qa_history (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            question    TEXT NOT NULL,
            answer      TEXT NOT NULL,
            context     TEXT,
            tier        TEXT NOT NULL DEFAULT 'primary',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Generated images (base64 payloads)
        CREATE TABLE IF NOT EXISTS image_records (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            prompt      TEXT NOT NULL,
            image_data  TEXT NOT NULL,
            tier        TEXT NOT NULL DEFAULT 'primary',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Generated social content
        CREATE TABLE IF NOT EXISTS content_records (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            prompt      TEXT NOT NULL,
            platform    TEXT NOT NULL,
            content     TEXT NOT NULL,
            tier        TEXT NOT NULL DEFAULT 'primary',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    info!("database migrations complete");
    Ok(())
}

/// Creates an in-memory database with migrations applied. Use in tests.
#[cfg(test)]
pub(crate) fn test_db() -> std::sync::Arc<tokio::sync::Mutex<Connection>> {
    use std::sync::Arc;

    let conn = Connection::open_in_memory().unwrap();
    migrate(&conn).unwrap();
    Arc::new(tokio::sync::Mutex::new(conn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_with_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taskrelay-test.db");
        let conn = open(&path).unwrap();
        drop(conn);
    }

    #[test]
    fn test_all_tables_exist_after_migration() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        for table in ["qa_history", "image_records", "content_records"] {
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(exists, "table {} should exist", table);
        }
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
    }
}
