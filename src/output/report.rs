//! Per-crawl success and failure counts

use std::fmt;
use std::time::Duration;

/// Summary of one crawl invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Pages fetched and parsed successfully (index, listing, generic and detail pages)
    pub pages_visited: u64,

    /// Pages whose fetch failed
    pub pages_failed: u64,

    /// Paper entries found on listing pages
    pub papers_found: u64,

    /// Artifacts downloaded and recorded as new papers
    pub papers_saved: u64,

    /// Artifacts downloaded whose URL was already recorded
    pub papers_existing: u64,

    /// Artifact downloads or writes that failed
    pub downloads_failed: u64,

    /// Detail pages without any artifact link
    pub artifacts_missing: u64,

    /// URLs skipped because another branch already claimed them
    pub already_visited: u64,

    /// Branches not started because a stop was requested
    pub branches_cancelled: u64,

    /// A stop was requested before the crawl finished
    pub interrupted: bool,

    /// Wall-clock duration of the crawl
    pub elapsed: Duration,
}

impl CrawlReport {
    /// Total branch-local failures
    pub fn failures(&self) -> u64 {
        self.pages_failed + self.downloads_failed
    }

    /// Artifacts that reached disk in this crawl
    pub fn downloads(&self) -> u64 {
        self.papers_saved + self.papers_existing
    }

    /// Returns true if a stop request cut the crawl short
    ///
    /// Set whenever a stop arrived during the run, even if every branch had
    /// already started and `branches_cancelled` stays zero.
    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Crawl Report ===")?;
        writeln!(f, "  Pages visited: {}", self.pages_visited)?;
        writeln!(f, "  Pages failed: {}", self.pages_failed)?;
        writeln!(f, "  Paper entries found: {}", self.papers_found)?;
        writeln!(f, "  Papers saved: {}", self.papers_saved)?;
        writeln!(f, "  Papers already recorded: {}", self.papers_existing)?;
        writeln!(f, "  Downloads failed: {}", self.downloads_failed)?;
        writeln!(f, "  Detail pages without artifact: {}", self.artifacts_missing)?;
        writeln!(f, "  Skipped (already visited): {}", self.already_visited)?;
        if self.interrupted {
            writeln!(
                f,
                "  Interrupted: {} branches cancelled",
                self.branches_cancelled
            )?;
        }
        write!(
            f,
            "  Successes: {}, failures: {} in {:.1}s",
            self.downloads(),
            self.failures(),
            self.elapsed.as_secs_f64()
        )
    }
}
