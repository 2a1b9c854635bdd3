//! Artifact download and persistence
//!
//! Fetches a paper's file, writes it under the download folder, and records
//! its metadata. The record insert is insert-if-absent keyed by artifact URL,
//! while the file on disk is always overwritten with the latest bytes.

use crate::crawler::fetcher::Fetcher;
use crate::storage::{lock_storage, NewPaper, SqliteStorage, Storage};
use crate::{DownloadError, DownloadFailure};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use url::Url;

/// File name used when a URL has no usable final path segment
const FALLBACK_FILE_NAME: &str = "artifact";

/// Result of a successful download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// A new record was written
    Saved(NewPaper),

    /// The URL was already recorded; the file was rewritten but the record kept
    AlreadyRecorded(NewPaper),
}

impl StoreOutcome {
    pub fn paper(&self) -> &NewPaper {
        match self {
            Self::Saved(paper) | Self::AlreadyRecorded(paper) => paper,
        }
    }
}

/// Metadata carried from the listing entry to the stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperMetadata {
    pub title: String,
    pub authors: String,
    pub year: String,
}

/// Derives the on-disk file name from an artifact URL
///
/// Uses the last non-empty path segment. Distinct URLs sharing a final
/// segment map to the same name and overwrite each other.
pub fn file_name_for(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
        })
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

/// Downloads an artifact into `folder` and records it
///
/// # Arguments
///
/// * `fetcher` - Shared HTTP fetcher
/// * `storage` - Shared paper store
/// * `run_id` - Crawl run the record is attributed to
/// * `artifact_url` - URL of the file to download
/// * `folder` - Download folder, created if missing
/// * `metadata` - Title, authors and year from the listing
///
/// # Returns
///
/// * `Ok(StoreOutcome)` - File written; record inserted or already present
/// * `Err(DownloadError)` - Fetch, write, or record failure for this URL
pub async fn fetch_and_store(
    fetcher: &Fetcher,
    storage: &Mutex<SqliteStorage>,
    run_id: Option<i64>,
    artifact_url: &str,
    folder: &Path,
    metadata: PaperMetadata,
) -> Result<StoreOutcome, DownloadError> {
    let fail = |source: DownloadFailure| DownloadError {
        url: artifact_url.to_string(),
        source,
    };

    let bytes = fetcher
        .fetch_bytes(artifact_url)
        .await
        .map_err(|e| fail(DownloadFailure::Fetch(e)))?;

    let file_path = write_artifact(folder, &file_name_for(artifact_url), &bytes)
        .await
        .map_err(|e| fail(DownloadFailure::Io(e)))?;

    let paper = NewPaper {
        title: metadata.title,
        authors: metadata.authors,
        url: artifact_url.to_string(),
        file_path: file_path.to_string_lossy().into_owned(),
        year: metadata.year,
    };

    let inserted = {
        let mut storage = lock_storage(storage).map_err(|e| fail(DownloadFailure::Storage(e)))?;
        storage
            .insert_if_absent(&paper, run_id)
            .map_err(|e| fail(DownloadFailure::Storage(e)))?
    };

    tracing::debug!(
        "Stored {} ({} bytes) at {}",
        artifact_url,
        bytes.len(),
        paper.file_path
    );

    if inserted {
        Ok(StoreOutcome::Saved(paper))
    } else {
        Ok(StoreOutcome::AlreadyRecorded(paper))
    }
}

/// Writes bytes to `folder/name`, returning the absolute path
async fn write_artifact(folder: &Path, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(folder).await?;
    let path = folder.join(name);
    tokio::fs::write(&path, bytes).await?;
    tokio::fs::canonicalize(&path).await
}
