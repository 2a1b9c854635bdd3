//! State module for tracking crawl progress
//!
//! This module provides the state shared by every branch of one crawl.
//!
//! # Components
//!
//! - `CrawlStage`: How a page at a given depth is interpreted (index, listing, generic, terminal)
//! - `VisitedSet`: Atomic check-and-insert record of URLs already claimed by a branch

mod crawl_stage;
mod visited;

// Re-export main types
pub use crawl_stage::CrawlStage;
pub use visited::VisitedSet;
