//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Paper-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_visited INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0,
    papers_saved INTEGER NOT NULL DEFAULT 0,
    papers_existing INTEGER NOT NULL DEFAULT 0,
    downloads_failed INTEGER NOT NULL DEFAULT 0,
    artifacts_missing INTEGER NOT NULL DEFAULT 0
);

-- Downloaded papers, one row per artifact URL
CREATE TABLE IF NOT EXISTS papers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    authors TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    file_path TEXT NOT NULL,
    year TEXT NOT NULL,
    label TEXT,
    run_id INTEGER REFERENCES runs(id),
    downloaded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_papers_label ON papers(label);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
