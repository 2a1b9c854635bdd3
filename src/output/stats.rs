//! Statistics generation from the paper database
//!
//! This module provides functionality for extracting and displaying
//! collection statistics from the storage layer.

use crate::storage::{RunRecord, Storage, StorageResult};

/// Paper collection statistics
#[derive(Debug, Clone)]
pub struct CollectionStatistics {
    /// Total number of recorded papers
    pub total_papers: u64,

    /// Papers without a label
    pub unlabeled: u64,

    /// Labeled papers per label, largest first
    pub by_label: Vec<(String, u64)>,

    /// Most recent crawl run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CollectionStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CollectionStatistics> {
    let total_papers = storage.count_papers()?;
    let unlabeled = storage.count_unlabeled()?;

    let mut by_label: Vec<(String, u64)> = storage.count_by_label()?.into_iter().collect();
    by_label.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let latest_run = storage.get_latest_run()?;

    Ok(CollectionStatistics {
        total_papers,
        unlabeled,
        by_label,
        latest_run,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CollectionStatistics) {
    println!("=== Paper Collection Statistics ===\n");

    println!("Overview:");
    println!("  Total papers: {}", stats.total_papers);
    println!("  Unlabeled: {}", stats.unlabeled);
    println!();

    if !stats.by_label.is_empty() {
        println!("Papers by Label:");
        for (label, count) in &stats.by_label {
            let percentage = if stats.total_papers > 0 {
                (*count as f64 / stats.total_papers as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", label, count, percentage);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Pages visited: {}", run.pages_visited);
            println!("  Papers saved: {}", run.papers_saved);
            println!(
                "  Failures: {} pages, {} downloads",
                run.pages_failed, run.downloads_failed
            );
        }
        None => println!("No crawl runs recorded."),
    }
}
