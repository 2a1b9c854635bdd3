//! Detail page resolution
//!
//! Locates the downloadable artifact a paper's detail page links to. Only
//! the detail page itself is fetched; the artifact is left to the downloader.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::PageDocument;
use crate::state::VisitedSet;
use crate::FetchError;
use url::Url;

/// Link to a paper's downloadable file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLink {
    pub url: String,
}

/// Outcome of resolving one detail page
#[derive(Debug)]
pub enum Resolution {
    /// The first artifact link in document order
    Found(ArtifactLink),

    /// The page was fetched but links to no known artifact type
    NotFound,

    /// The detail page was already visited in this crawl
    AlreadyVisited,

    /// The detail page could not be fetched
    Failed(FetchError),
}

/// Checks whether a URL's path ends in one of the given extensions
///
/// The comparison ignores ASCII case, and query strings and fragments are not
/// part of the path, so `/paper.PDF?download=1` matches `pdf`.
pub fn has_artifact_extension(url: &str, extensions: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };

    let Some(last_segment) = parsed.path().rsplit('/').next() else {
        return false;
    };

    let Some((_, extension)) = last_segment.rsplit_once('.') else {
        return false;
    };

    extensions
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(extension))
}

/// Returns the first anchor on the page that points at an artifact
pub fn find_artifact(document: &PageDocument, extensions: &[String]) -> Option<ArtifactLink> {
    document
        .links
        .iter()
        .find(|link| has_artifact_extension(&link.url, extensions))
        .map(|link| ArtifactLink {
            url: link.url.clone(),
        })
}

/// Fetches a detail page and finds its artifact link
///
/// The detail URL is marked visited before any request is made; a URL seen
/// earlier in the crawl resolves to [`Resolution::AlreadyVisited`] without I/O.
pub async fn resolve_artifact(
    fetcher: &Fetcher,
    visited: &VisitedSet,
    detail_url: &str,
    extensions: &[String],
) -> Resolution {
    if !visited.try_visit(detail_url) {
        tracing::debug!("Detail page already visited: {}", detail_url);
        return Resolution::AlreadyVisited;
    }

    match fetcher.fetch_page(detail_url).await {
        Ok(document) => match find_artifact(&document, extensions) {
            Some(artifact) => Resolution::Found(artifact),
            None => Resolution::NotFound,
        },
        Err(e) => Resolution::Failed(e),
    }
}
