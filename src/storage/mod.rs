//! Storage module for persisting crawl data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent paper record insertion keyed by artifact URL
//! - Label bookkeeping for the annotation stage
//! - Run tracking with per-crawl success/failure counts

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared by every branch of a crawl
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Locks shared storage, mapping a poisoned lock to [`StorageError::Poisoned`]
///
/// The guard must be dropped before the next `.await`.
pub fn lock_storage(storage: &Mutex<SqliteStorage>) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::Poisoned)
}

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Sentinel stored when the artifact year could not be determined
pub const UNKNOWN_YEAR: &str = "Unknown Year";

/// Label given to papers the classifier could not place in a known category
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

/// A paper about to be recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaper {
    pub title: String,
    pub authors: String,
    /// Artifact URL; the unique key
    pub url: String,
    pub file_path: String,
    pub year: String,
}

/// Represents a paper in the database
#[derive(Debug, Clone)]
pub struct PaperRecord {
    pub id: i64,
    pub title: String,
    pub authors: String,
    pub url: String,
    pub file_path: String,
    pub year: String,
    pub label: Option<String>,
    pub run_id: Option<i64>,
    pub downloaded_at: String,
}

/// A paper still waiting for a label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnprocessedPaper {
    pub id: i64,
    pub file_path: String,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub pages_visited: u64,
    pub pages_failed: u64,
    pub papers_saved: u64,
    pub papers_existing: u64,
    pub downloads_failed: u64,
    pub artifacts_missing: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
