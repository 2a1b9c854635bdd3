//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client from configuration
//! - GET requests for HTML pages (the link extractor)
//! - GET requests for binary artifacts
//! - Bounding the number of requests in flight
//! - Error classification

use crate::config::CrawlerConfig;
use crate::crawler::parser::PageDocument;
use crate::{FetchError, FetchErrorKind};
use reqwest::{redirect::Policy, Client, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// Maximum redirect hops followed transparently
const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed transparently. Certificate validation is disabled
/// when `accept_invalid_certs` is set, which the target proceedings site needs.
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.request_timeout_secs.min(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rate-bounded HTTP fetcher shared by every branch of a crawl
///
/// Each request holds one permit from a shared semaphore until its body has
/// been read, so at most `max_concurrent_requests` transfers run at once.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    permits: Arc<Semaphore>,
}

impl Fetcher {
    /// Creates a fetcher from crawler configuration
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        Ok(Self::with_client(
            client,
            config.max_concurrent_requests as usize,
        ))
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client, max_in_flight: usize) -> Self {
        Self {
            client,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Fetches a page and extracts its links
    ///
    /// Issues a GET, rejects non-2xx statuses, decodes the body as text and
    /// parses it. Relative links are resolved against the final URL after
    /// redirects. Never panics; every failure comes back as a [`FetchError`].
    pub async fn fetch_page(&self, url: &str) -> Result<PageDocument, FetchError> {
        let _permit = self.acquire(url).await?;
        let response = self.send(url).await?;
        let final_url = response.url().clone();

        let body = response
            .text()
            .await
            .map_err(|e| classify_body_error(url, e))?;

        tracing::trace!("Fetched {} ({} bytes)", final_url, body.len());
        Ok(PageDocument::parse(body, final_url))
    }

    /// Fetches a binary artifact
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let _permit = self.acquire(url).await?;
        let response = self.send(url).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_body_error(url, e))?;

        Ok(bytes.to_vec())
    }

    async fn acquire(
        &self,
        url: &str,
    ) -> Result<tokio::sync::SemaphorePermit<'_>, FetchError> {
        self.permits.acquire().await.map_err(|_| {
            FetchError::new(
                url,
                FetchErrorKind::Request("request limiter closed".to_string()),
            )
        })
    }

    /// Sends a GET and checks the status
    async fn send(&self, url: &str) -> Result<Response, FetchError> {
        let parsed = Url::parse(url)
            .map_err(|e| FetchError::new(url, FetchErrorKind::InvalidUrl(e.to_string())))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| classify_request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(url, FetchErrorKind::Status(status.as_u16())));
        }

        Ok(response)
    }
}

/// Maps a reqwest send error onto a fetch error kind
fn classify_request_error(url: &str, e: reqwest::Error) -> FetchError {
    let kind = if e.is_timeout() {
        FetchErrorKind::Timeout
    } else if e.is_connect() {
        FetchErrorKind::Connect(e.to_string())
    } else if let Some(status) = e.status() {
        FetchErrorKind::Status(status.as_u16())
    } else {
        FetchErrorKind::Request(e.to_string())
    };
    FetchError::new(url, kind)
}

/// Maps a reqwest body error onto a fetch error kind
fn classify_body_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::new(url, FetchErrorKind::Timeout)
    } else {
        FetchError::new(url, FetchErrorKind::Body(e.to_string()))
    }
}
