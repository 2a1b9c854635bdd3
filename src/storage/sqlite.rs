//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::output::CrawlReport;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    NewPaper, PaperRecord, RunRecord, RunStatus, UnprocessedPaper, UNCATEGORIZED_LABEL,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, pages_visited,
     pages_failed, papers_saved, papers_existing, downloads_failed, artifacts_missing";

const PAPER_COLUMNS: &str =
    "id, title, authors, url, file_path, year, label, run_id, downloaded_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// Parent directories of `path` are created if missing.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        pages_visited: row.get::<_, i64>(5)? as u64,
        pages_failed: row.get::<_, i64>(6)? as u64,
        papers_saved: row.get::<_, i64>(7)? as u64,
        papers_existing: row.get::<_, i64>(8)? as u64,
        downloads_failed: row.get::<_, i64>(9)? as u64,
        artifacts_missing: row.get::<_, i64>(10)? as u64,
    })
}

fn paper_from_row(row: &Row<'_>) -> rusqlite::Result<PaperRecord> {
    Ok(PaperRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        authors: row.get(2)?,
        url: row.get(3)?,
        file_path: row.get(4)?,
        year: row.get(5)?,
        label: row.get(6)?,
        run_id: row.get(7)?,
        downloaded_at: row.get(8)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        report: &CrawlReport,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, pages_visited = ?3, pages_failed = ?4,
             papers_saved = ?5, papers_existing = ?6, downloads_failed = ?7, artifacts_missing = ?8
             WHERE id = ?9",
            params![
                status.to_db_string(),
                now,
                report.pages_visited as i64,
                report.pages_failed as i64,
                report.papers_saved as i64,
                report.papers_existing as i64,
                report.downloads_failed as i64,
                report.artifacts_missing as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Paper Management =====

    fn insert_if_absent(&mut self, paper: &NewPaper, run_id: Option<i64>) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO papers (title, authors, url, file_path, year, run_id, downloaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                paper.title,
                paper.authors,
                paper.url,
                paper.file_path,
                paper.year,
                run_id,
                now
            ],
        )?;
        Ok(inserted > 0)
    }

    fn get_paper_by_url(&self, url: &str) -> StorageResult<Option<PaperRecord>> {
        let paper = self
            .conn
            .query_row(
                &format!("SELECT {} FROM papers WHERE url = ?1", PAPER_COLUMNS),
                params![url],
                paper_from_row,
            )
            .optional()?;

        Ok(paper)
    }

    fn get_paper(&self, id: i64) -> StorageResult<PaperRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM papers WHERE id = ?1", PAPER_COLUMNS),
                params![id],
                paper_from_row,
            )
            .optional()?
            .ok_or(StorageError::PaperNotFound(id))
    }

    // ===== Annotation =====

    fn list_unprocessed(&self) -> StorageResult<Vec<UnprocessedPaper>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, file_path FROM papers WHERE label IS NULL OR label = ?1 ORDER BY id",
        )?;

        let papers = stmt
            .query_map(params![UNCATEGORIZED_LABEL], |row| {
                Ok(UnprocessedPaper {
                    id: row.get(0)?,
                    file_path: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(papers)
    }

    fn update_label(&mut self, id: i64, label: &str) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE papers SET label = ?1 WHERE id = ?2",
            params![label, id],
        )?;

        if updated == 0 {
            return Err(StorageError::PaperNotFound(id));
        }
        Ok(())
    }

    // ===== Statistics =====

    fn count_papers(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM papers", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_by_label(&self) -> StorageResult<HashMap<String, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT label, COUNT(*) FROM papers WHERE label IS NOT NULL GROUP BY label",
        )?;

        let mut counts = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (label, count) = row?;
            counts.insert(label, count as u64);
        }

        Ok(counts)
    }

    fn count_unlabeled(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM papers WHERE label IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
