//! Output module for crawl reports and collection statistics
//!
//! This module handles:
//! - The per-crawl success/failure report
//! - Statistics over the recorded paper collection

mod report;
pub mod stats;

pub use report::CrawlReport;
pub use stats::{load_statistics, print_statistics, CollectionStatistics};
