//! Crawl stage definitions for the depth-bounded traversal
//!
//! Every `(url, depth)` pair the coordinator handles is in exactly one stage.
//! The stage decides how a page's links are interpreted.

use std::fmt;

/// The stage of a single traversal step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlStage {
    /// Depth 0: the index page; links matching the year filter lead to listings
    Index,

    /// Depth 1: a paper-list page; each list item is one paper entry
    Listing,

    /// Depth 2 up to `max_depth`: every extracted link is followed
    Generic,

    /// Past `max_depth`, already visited, or failed to fetch: the branch ends
    Terminal,
}

impl CrawlStage {
    /// Depth of the index page
    pub const INDEX_DEPTH: u32 = 0;

    /// Depth of paper-list pages
    pub const LISTING_DEPTH: u32 = 1;

    /// Returns the stage a page at `depth` is in, given the configured ceiling
    ///
    /// Depth is a strict upper bound: anything deeper than `max_depth` is
    /// terminal regardless of how it was reached.
    pub fn for_depth(depth: u32, max_depth: u32) -> Self {
        if depth > max_depth {
            return Self::Terminal;
        }

        match depth {
            Self::INDEX_DEPTH => Self::Index,
            Self::LISTING_DEPTH => Self::Listing,
            _ => Self::Generic,
        }
    }

    /// Returns true if no further work happens in this stage
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }

    /// Short name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Listing => "listing",
            Self::Generic => "generic",
            Self::Terminal => "terminal",
        }
    }
}

impl fmt::Display for CrawlStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_depth_layout() {
        assert_eq!(CrawlStage::for_depth(0, 2), CrawlStage::Index);
        assert_eq!(CrawlStage::for_depth(1, 2), CrawlStage::Listing);
        assert_eq!(CrawlStage::for_depth(2, 2), CrawlStage::Generic);
        assert_eq!(CrawlStage::for_depth(3, 2), CrawlStage::Terminal);
    }

    #[test]
    fn test_max_depth_is_strict_ceiling() {
        assert_eq!(CrawlStage::for_depth(0, 0), CrawlStage::Index);
        assert_eq!(CrawlStage::for_depth(1, 0), CrawlStage::Terminal);
        assert_eq!(CrawlStage::for_depth(1, 1), CrawlStage::Listing);
        assert_eq!(CrawlStage::for_depth(2, 1), CrawlStage::Terminal);
        assert_eq!(CrawlStage::for_depth(5, 6), CrawlStage::Generic);
    }

    #[test]
    fn test_display() {
        assert_eq!(CrawlStage::Listing.to_string(), "listing");
        assert!(CrawlStage::Terminal.is_terminal());
        assert!(!CrawlStage::Index.is_terminal());
    }
}
