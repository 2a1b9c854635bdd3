//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::output::CrawlReport;
use crate::storage::{NewPaper, PaperRecord, RunRecord, RunStatus, UnprocessedPaper};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Paper not found: {0}")]
    PaperNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawl itself only calls [`Storage::insert_if_absent`] and the run
/// bookkeeping; the label operations belong to the annotation stage.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Finishes a run, recording its final status and counts
    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        report: &CrawlReport,
    ) -> StorageResult<()>;

    // ===== Paper Management =====

    /// Inserts a paper unless one with the same URL already exists
    ///
    /// An existing record is left untouched.
    ///
    /// # Returns
    ///
    /// True if a new row was written, false if the URL was already recorded
    fn insert_if_absent(&mut self, paper: &NewPaper, run_id: Option<i64>) -> StorageResult<bool>;

    /// Gets a paper by its artifact URL
    fn get_paper_by_url(&self, url: &str) -> StorageResult<Option<PaperRecord>>;

    /// Gets a paper by ID
    fn get_paper(&self, id: i64) -> StorageResult<PaperRecord>;

    // ===== Annotation =====

    /// Lists papers with no label yet or labeled as uncategorized
    fn list_unprocessed(&self) -> StorageResult<Vec<UnprocessedPaper>>;

    /// Sets the label of a paper
    fn update_label(&mut self, id: i64, label: &str) -> StorageResult<()>;

    // ===== Statistics =====

    /// Gets total paper count
    fn count_papers(&self) -> StorageResult<u64>;

    /// Counts labeled papers per label
    fn count_by_label(&self) -> StorageResult<HashMap<String, u64>>;

    /// Counts papers with no label
    fn count_unlabeled(&self) -> StorageResult<u64>;
}
