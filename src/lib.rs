//! Paper-Harvest: an academic paper crawler and annotator
//!
//! This crate walks a paginated conference-proceedings site (index page, then
//! per-year paper lists, then paper detail pages), downloads each paper's
//! artifact exactly once per crawl, records its metadata in SQLite, and later
//! labels the downloaded papers with a topic category via a remote classifier.

pub mod annotate;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Paper-Harvest operations
///
/// Only the variants surfaced by [`crawler::Coordinator::run`] and the setup
/// paths are fatal. Per-page and per-download failures are reported through
/// [`FetchError`] and [`DownloadError`] and never abort a crawl.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Root page unreachable: {0}")]
    RootUnreachable(FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Failure to retrieve a page or artifact over HTTP
#[derive(Debug, Error)]
#[error("Fetch failed for {url}: {kind}")]
pub struct FetchError {
    pub url: String,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(url: impl Into<String>, kind: FetchErrorKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    /// Returns the HTTP status code if the server answered with a non-2xx status
    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            FetchErrorKind::Status(code) => Some(code),
            _ => None,
        }
    }
}

/// The cause of a [`FetchError`]
#[derive(Debug, Error)]
pub enum FetchErrorKind {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Failure to download an artifact or record it
#[derive(Debug, Error)]
#[error("Download failed for {url}: {source}")]
pub struct DownloadError {
    pub url: String,
    #[source]
    pub source: DownloadFailure,
}

/// The cause of a [`DownloadError`]
#[derive(Debug, Error)]
pub enum DownloadFailure {
    #[error("{0}")]
    Fetch(FetchError),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record failed: {0}")]
    Storage(#[from] storage::StorageError),
}

/// Result type alias for Paper-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, StopHandle};
pub use output::CrawlReport;
pub use state::{CrawlStage, VisitedSet};
