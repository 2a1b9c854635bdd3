//! Traversal-scoped record of URLs already claimed by a branch

use std::collections::HashSet;
use std::sync::Mutex;

/// Set of URLs visited during one crawl
///
/// The only operation that mutates the set is [`VisitedSet::try_visit`], which
/// checks and inserts under one lock, so two branches racing on the same URL
/// can never both see it as new. The set is never iterated.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: Mutex<HashSet<String>>,
}

impl VisitedSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `url` for the caller
    ///
    /// Returns true only the first time a URL is seen in this crawl. Callers
    /// must invoke this before issuing any request for the URL; false means
    /// another branch already owns it and the caller should skip silently.
    pub fn try_visit(&self, url: &str) -> bool {
        // A poisoned lock only means another branch panicked mid-insert; the
        // set itself is still consistent.
        let mut urls = self.urls.lock().unwrap_or_else(|e| e.into_inner());
        urls.insert(url.to_string())
    }

    /// Returns true if `url` was already claimed
    pub fn contains(&self, url: &str) -> bool {
        let urls = self.urls.lock().unwrap_or_else(|e| e.into_inner());
        urls.contains(url)
    }

    /// Number of URLs claimed so far
    pub fn len(&self) -> usize {
        let urls = self.urls.lock().unwrap_or_else(|e| e.into_inner());
        urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
