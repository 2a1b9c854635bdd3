//! Crawler module for page fetching and paper discovery
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a bounded number of requests in flight
//! - HTML parsing and link extraction
//! - Depth-specific page classification
//! - Detail page resolution and artifact download
//! - Overall crawl coordination

mod coordinator;
mod download;
mod fetcher;
mod parser;
mod resolver;
mod strategy;

pub use coordinator::{Coordinator, StopHandle};
pub use download::{fetch_and_store, file_name_for, PaperMetadata, StoreOutcome};
pub use fetcher::{build_http_client, Fetcher};
pub use parser::{PageDocument, PageLink};
pub use resolver::{find_artifact, has_artifact_extension, resolve_artifact, ArtifactLink, Resolution};
pub use strategy::{CrawlTarget, NextStep, PageClassifier, PaperEntry, UNKNOWN_AUTHORS};

use crate::config::Config;
use crate::output::CrawlReport;
use crate::storage::open_storage;
use crate::HarvestError;
use std::path::Path;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the paper database
/// 2. Build the HTTP client
/// 3. Walk the site from the root URL
/// 4. Download and record every paper found
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash of the configuration file, stored with the run
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl finished; branch failures are counted, not raised
/// * `Err(HarvestError)` - Root page unreachable or storage unusable
pub async fn crawl(config: Config, config_hash: &str) -> Result<CrawlReport, HarvestError> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    Coordinator::new(config, storage)?
        .with_config_hash(config_hash)
        .run()
        .await
}
