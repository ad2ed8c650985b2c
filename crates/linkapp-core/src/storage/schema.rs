//! SQLite schema for the key-value engine
//!
//! Each value kind gets its own table. Every row carries the logical
//! database index `db`, so several independent keyspaces can share one file.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Hash records: one row per field
        CREATE TABLE IF NOT EXISTS kv_hashes (
            db INTEGER NOT NULL,
            key TEXT NOT NULL,
            field TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (db, key, field)
        );

        -- Plain sets
        CREATE TABLE IF NOT EXISTS kv_sets (
            db INTEGER NOT NULL,
            key TEXT NOT NULL,
            member TEXT NOT NULL,
            PRIMARY KEY (db, key, member)
        );

        -- Sorted sets
        CREATE TABLE IF NOT EXISTS kv_zsets (
            db INTEGER NOT NULL,
            key TEXT NOT NULL,
            member TEXT NOT NULL,
            score REAL NOT NULL,
            PRIMARY KEY (db, key, member)
        );

        -- Rank and score range reads walk this index
        CREATE INDEX IF NOT EXISTS idx_kv_zsets_score ON kv_zsets(db, key, score DESC, member DESC);
        "#,
    )?;

    // Set schema version
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}
