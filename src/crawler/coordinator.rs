//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives one crawl invocation:
//! - Opening a run record and fetching the root page
//! - Walking the `(url, depth)` tree one level at a time
//! - Dispatching paper entries to the detail resolver and downloader
//! - Honoring cooperative stop requests
//! - Producing the final [`CrawlReport`]
//!
//! Branches are independent. A failed fetch or download ends only its own
//! branch and is counted in the report; the only fatal error is an
//! unreachable root page.

use crate::config::Config;
use crate::crawler::download::{fetch_and_store, PaperMetadata, StoreOutcome};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::PageDocument;
use crate::crawler::resolver::{resolve_artifact, Resolution};
use crate::crawler::strategy::{CrawlTarget, NextStep, PageClassifier, PaperEntry};
use crate::output::CrawlReport;
use crate::state::{CrawlStage, VisitedSet};
use crate::storage::{lock_storage, RunStatus, SharedStorage, SqliteStorage, Storage, UNKNOWN_YEAR};
use crate::HarvestError;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Cooperative stop signal for a running crawl
///
/// Once a stop is requested no new branch starts; branches already fetching
/// or downloading run to completion.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters updated concurrently by every branch
#[derive(Debug, Default)]
struct CrawlCounters {
    pages_visited: AtomicU64,
    pages_failed: AtomicU64,
    papers_found: AtomicU64,
    papers_saved: AtomicU64,
    papers_existing: AtomicU64,
    downloads_failed: AtomicU64,
    artifacts_missing: AtomicU64,
    already_visited: AtomicU64,
    branches_cancelled: AtomicU64,
}

impl CrawlCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, started: Instant, stop: &StopHandle) -> CrawlReport {
        let read = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CrawlReport {
            pages_visited: read(&self.pages_visited),
            pages_failed: read(&self.pages_failed),
            papers_found: read(&self.papers_found),
            papers_saved: read(&self.papers_saved),
            papers_existing: read(&self.papers_existing),
            downloads_failed: read(&self.downloads_failed),
            artifacts_missing: read(&self.artifacts_missing),
            already_visited: read(&self.already_visited),
            branches_cancelled: read(&self.branches_cancelled),
            interrupted: stop.is_stop_requested(),
            elapsed: started.elapsed(),
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SharedStorage,
    fetcher: Fetcher,
    classifier: PageClassifier,
    download_folder: PathBuf,
    config_hash: String,
    stop: StopHandle,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `storage` - The paper store records are written to
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - The HTTP client could not be built
    pub fn new(config: Config, storage: SqliteStorage) -> Result<Self, HarvestError> {
        let fetcher = Fetcher::new(&config.crawler)?;
        let classifier = PageClassifier::from_config(&config.crawler);
        let download_folder = PathBuf::from(&config.output.download_folder);

        Ok(Self {
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            fetcher,
            classifier,
            download_folder,
            config_hash: String::new(),
            stop: StopHandle::new(),
        })
    }

    /// Sets the configuration hash recorded on the run row
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    /// Returns a handle that can stop this crawl from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Returns the shared paper store
    pub fn storage(&self) -> SharedStorage {
        Arc::clone(&self.storage)
    }

    /// Runs one crawl from the configured root URL
    ///
    /// The traversal is an explicit worklist of [`CrawlTarget`]s processed
    /// level by level. Each level is fanned out with at most
    /// `max_concurrent_requests` branches in flight, and the fetcher's
    /// semaphore bounds the total number of HTTP requests.
    ///
    /// A fresh [`VisitedSet`] is created for every call, so running the same
    /// coordinator twice re-fetches every page and relies on the store's
    /// URL uniqueness to avoid duplicate records.
    pub async fn run(&self) -> Result<CrawlReport, HarvestError> {
        let started = Instant::now();
        let run_id = lock_storage(&self.storage)?.create_run(&self.config_hash)?;
        let counters = CrawlCounters::default();
        let visited = VisitedSet::new();

        tracing::info!(
            "Starting crawl run {} at {} (max depth {}, years {:?})",
            run_id,
            self.config.crawler.root_url,
            self.config.crawler.max_depth,
            self.config.crawler.year_filter
        );

        let root = CrawlTarget::root(self.config.crawler.root_url.clone());
        visited.try_visit(&root.url);

        let document = match self.fetcher.fetch_page(&root.url).await {
            Ok(document) => document,
            Err(e) => {
                tracing::error!("Root page unreachable: {}", e);
                CrawlCounters::bump(&counters.pages_failed);
                let report = counters.snapshot(started, &self.stop);
                if let Err(finish_error) = self.finish(run_id, RunStatus::Failed, &report) {
                    tracing::error!("Failed to record run {} as failed: {}", run_id, finish_error);
                }
                return Err(HarvestError::RootUnreachable(e));
            }
        };
        CrawlCounters::bump(&counters.pages_visited);

        let mut frontier = self
            .expand(&root, document, run_id, &visited, &counters)
            .await;
        let branch_limit = self.config.crawler.max_concurrent_requests.max(1) as usize;

        while !frontier.is_empty() {
            tracing::debug!("Crawling {} targets at the next level", frontier.len());

            let next_level: Vec<Vec<CrawlTarget>> = stream::iter(frontier)
                .map(|target| self.visit(target, run_id, &visited, &counters))
                .buffer_unordered(branch_limit)
                .collect()
                .await;

            frontier = next_level.into_iter().flatten().collect();
        }

        let report = counters.snapshot(started, &self.stop);
        let status = if report.interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        self.finish(run_id, status, &report)?;

        tracing::info!(
            "Crawl run {} {}: {} saved, {} already recorded, {} failures in {:.1}s",
            run_id,
            status.to_db_string(),
            report.papers_saved,
            report.papers_existing,
            report.failures(),
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }

    /// Processes one non-root target and returns the targets it discovered
    async fn visit(
        &self,
        target: CrawlTarget,
        run_id: i64,
        visited: &VisitedSet,
        counters: &CrawlCounters,
    ) -> Vec<CrawlTarget> {
        if self.classifier.stage(&target).is_terminal() {
            return Vec::new();
        }

        if self.stop.is_stop_requested() {
            CrawlCounters::bump(&counters.branches_cancelled);
            return Vec::new();
        }

        if !visited.try_visit(&target.url) {
            tracing::debug!("Already visited: {}", target.url);
            CrawlCounters::bump(&counters.already_visited);
            return Vec::new();
        }

        match self.fetcher.fetch_page(&target.url).await {
            Ok(document) => {
                CrawlCounters::bump(&counters.pages_visited);
                self.expand(&target, document, run_id, visited, counters)
                    .await
            }
            Err(e) => {
                tracing::warn!("Branch ended at depth {}: {}", target.depth, e);
                CrawlCounters::bump(&counters.pages_failed);
                Vec::new()
            }
        }
    }

    /// Classifies a fetched page, handles its paper entries, and returns the
    /// deeper targets it links to
    async fn expand(
        &self,
        target: &CrawlTarget,
        document: PageDocument,
        run_id: i64,
        visited: &VisitedSet,
        counters: &CrawlCounters,
    ) -> Vec<CrawlTarget> {
        let stage = self.classifier.stage(target);
        let steps = self.classifier.classify(target, &document);
        tracing::debug!(
            "{} page {} (depth {}) yielded {} steps",
            stage,
            document.url,
            target.depth,
            steps.len()
        );

        let mut children = Vec::new();
        let mut entries = Vec::new();

        for step in steps {
            match step {
                NextStep::Recurse(child) => {
                    if !self.classifier.stage(&child).is_terminal() {
                        children.push(child);
                    }
                }
                NextStep::PaperEntry(entry) => entries.push(entry),
            }
        }

        if entries.is_empty() {
            return children;
        }

        counters
            .papers_found
            .fetch_add(entries.len() as u64, Ordering::Relaxed);

        // Detail pages sit one level below the listing
        if CrawlStage::for_depth(target.depth + 1, self.config.crawler.max_depth).is_terminal() {
            tracing::info!(
                "Skipping {} paper entries on {}: detail pages exceed max depth",
                entries.len(),
                document.url
            );
            return children;
        }

        let branch_limit = self.config.crawler.max_concurrent_requests.max(1) as usize;
        stream::iter(entries)
            .for_each_concurrent(branch_limit, |entry| {
                self.process_entry(entry, run_id, visited, counters)
            })
            .await;

        children
    }

    /// Resolves one paper entry's artifact and downloads it
    async fn process_entry(
        &self,
        entry: PaperEntry,
        run_id: i64,
        visited: &VisitedSet,
        counters: &CrawlCounters,
    ) {
        if self.stop.is_stop_requested() {
            CrawlCounters::bump(&counters.branches_cancelled);
            return;
        }

        let extensions = &self.config.crawler.artifact_extensions;
        let artifact = match resolve_artifact(&self.fetcher, visited, &entry.detail_url, extensions)
            .await
        {
            Resolution::Found(artifact) => {
                CrawlCounters::bump(&counters.pages_visited);
                artifact
            }
            Resolution::NotFound => {
                CrawlCounters::bump(&counters.pages_visited);
                CrawlCounters::bump(&counters.artifacts_missing);
                tracing::info!(
                    "No artifact link for \"{}\" on {}",
                    entry.title,
                    entry.detail_url
                );
                return;
            }
            Resolution::AlreadyVisited => {
                CrawlCounters::bump(&counters.already_visited);
                return;
            }
            Resolution::Failed(e) => {
                CrawlCounters::bump(&counters.pages_failed);
                tracing::warn!("Detail page failed for \"{}\": {}", entry.title, e);
                return;
            }
        };

        let metadata = PaperMetadata {
            year: self.artifact_year(&entry),
            title: entry.title,
            authors: entry.authors,
        };

        match fetch_and_store(
            &self.fetcher,
            &self.storage,
            Some(run_id),
            &artifact.url,
            &self.download_folder,
            metadata,
        )
        .await
        {
            Ok(StoreOutcome::Saved(paper)) => {
                CrawlCounters::bump(&counters.papers_saved);
                tracing::info!("Saved \"{}\" to {}", paper.title, paper.file_path);
            }
            Ok(StoreOutcome::AlreadyRecorded(paper)) => {
                CrawlCounters::bump(&counters.papers_existing);
                tracing::debug!("Already recorded: {}", paper.url);
            }
            Err(e) => {
                CrawlCounters::bump(&counters.downloads_failed);
                tracing::warn!("{}", e);
            }
        }
    }

    /// Year stored with a downloaded artifact
    fn artifact_year(&self, entry: &PaperEntry) -> String {
        match (&entry.year, self.config.crawler.infer_year_from_index) {
            (Some(year), true) => year.clone(),
            _ => UNKNOWN_YEAR.to_string(),
        }
    }

    /// Records the final status and counts on the run row
    fn finish(&self, run_id: i64, status: RunStatus, report: &CrawlReport) -> Result<(), HarvestError> {
        let mut storage = lock_storage(&self.storage)?;
        storage.complete_run(run_id, status, report)?;
        Ok(())
    }
}
