//! Page classification by traversal depth
//!
//! Given a fetched page and the depth it was reached at, decide what the
//! next traversal steps are:
//!
//! | Stage | Depth | Emits |
//! |-------|-------|-------|
//! | Index | 0 | `Recurse` for links matching a year token |
//! | Listing | 1 | `PaperEntry` for every `<li>` holding an anchor |
//! | Generic | 2..=max | `Recurse` for every extracted link |
//! | Terminal | > max | nothing |

use crate::config::{CrawlerConfig, YearMatch};
use crate::crawler::parser::{collapse_whitespace, PageDocument, PageLink};
use crate::state::CrawlStage;
use scraper::Selector;

/// Authors placeholder for list items with no annotation node
pub const UNKNOWN_AUTHORS: &str = "Unknown Authors";

/// A page waiting to be visited
///
/// Created when a link is discovered and consumed once by a traversal step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub url: String,
    pub depth: u32,
    pub title: Option<String>,
    pub authors: Option<String>,
    /// Year token that selected this branch at the index page
    pub year: Option<String>,
}

impl CrawlTarget {
    /// The starting point of a crawl
    pub fn root(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: CrawlStage::INDEX_DEPTH,
            title: None,
            authors: None,
            year: None,
        }
    }

    /// A page linked from this one, one level deeper
    pub fn child(&self, link: &PageLink) -> Self {
        Self {
            url: link.url.clone(),
            depth: self.depth + 1,
            title: Some(link.text.clone()).filter(|t| !t.is_empty()),
            authors: None,
            year: self.year.clone(),
        }
    }
}

/// One paper found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperEntry {
    pub detail_url: String,
    pub title: String,
    pub authors: String,
    /// Year token inherited from the listing branch, if any
    pub year: Option<String>,
}

/// What to do after classifying a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// Visit another page one level deeper
    Recurse(CrawlTarget),

    /// Resolve and download a paper
    PaperEntry(PaperEntry),
}

/// Depth strategy for interpreting page structure
#[derive(Debug, Clone)]
pub struct PageClassifier {
    year_filter: Vec<String>,
    year_match: YearMatch,
    max_depth: u32,
}

impl PageClassifier {
    pub fn new(year_filter: Vec<String>, year_match: YearMatch, max_depth: u32) -> Self {
        Self {
            year_filter,
            year_match,
            max_depth,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.year_filter.clone(),
            config.year_match,
            config.max_depth,
        )
    }

    /// Returns the stage a target is in
    pub fn stage(&self, target: &CrawlTarget) -> CrawlStage {
        CrawlStage::for_depth(target.depth, self.max_depth)
    }

    /// Classifies a fetched page into ordered next steps
    pub fn classify(&self, target: &CrawlTarget, document: &PageDocument) -> Vec<NextStep> {
        match self.stage(target) {
            CrawlStage::Index => self.classify_index(target, document),
            CrawlStage::Listing => classify_listing(target, document),
            CrawlStage::Generic => classify_generic(target, document),
            CrawlStage::Terminal => Vec::new(),
        }
    }

    /// Returns the first year token the link matches, if any
    ///
    /// Matching is a case-sensitive substring test against either the anchor
    /// text or the link target, as configured.
    pub fn matching_year(&self, link: &PageLink) -> Option<&str> {
        let haystack = match self.year_match {
            YearMatch::AnchorText => link.text.as_str(),
            YearMatch::Url => link.url.as_str(),
        };

        self.year_filter
            .iter()
            .find(|token| haystack.contains(token.as_str()))
            .map(String::as_str)
    }

    fn classify_index(&self, target: &CrawlTarget, document: &PageDocument) -> Vec<NextStep> {
        document
            .links
            .iter()
            .filter_map(|link| {
                let year = self.matching_year(link)?;
                let mut child = target.child(link);
                child.year = Some(year.to_string());
                Some(NextStep::Recurse(child))
            })
            .collect()
    }
}

/// One `PaperEntry` per list item with an anchor
fn classify_listing(target: &CrawlTarget, document: &PageDocument) -> Vec<NextStep> {
    let (Ok(li_selector), Ok(a_selector), Ok(i_selector)) = (
        Selector::parse("li"),
        Selector::parse("a[href]"),
        Selector::parse("i"),
    ) else {
        return Vec::new();
    };

    let tree = document.tree();
    let mut steps = Vec::new();

    for item in tree.select(&li_selector) {
        let Some(anchor) = item.select(&a_selector).next() else {
            continue;
        };

        let Some(detail_url) = anchor
            .value()
            .attr("href")
            .and_then(|href| document.resolve(href))
        else {
            tracing::debug!("Skipping list item with unusable link on {}", document.url);
            continue;
        };

        let title = collapse_whitespace(&anchor.text().collect::<String>());
        let authors = item
            .select(&i_selector)
            .next()
            .map(|node| collapse_whitespace(&node.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHORS.to_string());

        steps.push(NextStep::PaperEntry(PaperEntry {
            detail_url,
            title,
            authors,
            year: target.year.clone(),
        }));
    }

    steps
}

/// Every extracted link, one level deeper
fn classify_generic(target: &CrawlTarget, document: &PageDocument) -> Vec<NextStep> {
    document
        .links
        .iter()
        .map(|link| NextStep::Recurse(target.child(link)))
        .collect()
}
