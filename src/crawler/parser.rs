//! HTML parser for extracting links
//!
//! This module turns a fetched HTML body into a [`PageDocument`]: every anchor
//! resolved to an absolute URL, in document order, together with its text.
//! The source is kept so depth-specific rules can inspect the element tree.

use scraper::{Html, Selector};
use url::Url;

/// An anchor found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Absolute target URL
    pub url: String,

    /// Visible anchor text, whitespace collapsed
    pub text: String,
}

/// Parse result of one fetched page
///
/// Lives for a single traversal step and is never persisted.
#[derive(Debug, Clone)]
pub struct PageDocument {
    /// URL the page was fetched from; base for relative links
    pub url: Url,

    /// All followable anchors in document order
    pub links: Vec<PageLink>,

    source: String,
}

impl PageDocument {
    /// Parses `html` fetched from `base_url`
    ///
    /// # Link Extraction Rules
    ///
    /// **Include:** every `<a href="...">`, relative hrefs joined against `base_url`
    ///
    /// **Exclude:**
    /// - `javascript:`, `mailto:`, `tel:` links
    /// - Data URIs
    /// - Fragment-only links
    /// - Non-HTTP(S) URLs after resolution
    ///
    /// # Example
    ///
    /// ```
    /// use paper_harvest::crawler::PageDocument;
    /// use url::Url;
    ///
    /// let html = r#"<html><body><a href="/paper/1">Paper</a></body></html>"#;
    /// let base_url = Url::parse("https://papers.example.org/2019").unwrap();
    /// let document = PageDocument::parse(html.to_string(), base_url);
    /// assert_eq!(document.links[0].url, "https://papers.example.org/paper/1");
    /// ```
    pub fn parse(html: String, base_url: Url) -> Self {
        let links = {
            let tree = Html::parse_document(&html);
            extract_links(&tree, &base_url)
        };

        Self {
            url: base_url,
            links,
            source: html,
        }
    }

    /// Re-parses the page into an element tree for structural queries
    pub fn tree(&self) -> Html {
        Html::parse_document(&self.source)
    }

    /// Resolves an href found on this page
    pub fn resolve(&self, href: &str) -> Option<String> {
        resolve_link(href, &self.url)
    }
}

/// Extracts all valid anchors from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<PageLink> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(PageLink {
                        url: absolute_url,
                        text: collapse_whitespace(&element.text().collect::<String>()),
                    });
                }
            }
        }
    }

    links
}

/// Collapses runs of whitespace into single spaces and trims the ends
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub(crate) fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
