//! Remote topic classifier
//!
//! Wraps the Gemini `generateContent` REST endpoint. The answer is matched
//! against the fixed category list; transient transport and API failures
//! are retried with a fixed delay.

use crate::annotate::{AnnotateError, Category, Label};
use crate::config::AnnotatorConfig;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Request timeout for a single classification call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest error body kept in [`AnnotateError::Api`]
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Builds the classification prompt for a paper's full text
pub fn build_prompt(text: &str) -> String {
    let names: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();
    format!(
        "Classify this research paper into one of these categories: {}. \
         Return only one of these exact words, without any additional text.\n\n\
         Paper Text: {}\nCategory:",
        names.join(", "),
        text
    )
}

/// Maps a classifier answer onto a category
///
/// The first category, in [`Category::ALL`] order, whose name appears in the
/// answer (ignoring case) wins.
pub fn match_category(response: &str) -> Result<Category, AnnotateError> {
    let normalized = response.trim().to_lowercase();
    Category::ALL
        .into_iter()
        .find(|category| normalized.contains(&category.as_str().to_lowercase()))
        .ok_or_else(|| AnnotateError::ClassificationMismatch {
            response: response.trim().to_string(),
        })
}

/// Client for the remote text classifier
#[derive(Debug, Clone)]
pub struct GeminiClassifier {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl GeminiClassifier {
    /// Creates a classifier with an explicit API key
    pub fn new(config: &AnnotatorConfig, api_key: String) -> Result<Self, AnnotateError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Creates a classifier reading the API key from the configured
    /// environment variable
    pub fn from_env(config: &AnnotatorConfig) -> Result<Self, AnnotateError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AnnotateError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }

    /// Classifies a paper's text, retrying failed calls
    ///
    /// An answer outside the category list is not retried; it yields
    /// [`Label::Uncategorized`]. Transient errors are retried, up to
    /// `max_retries` attempts in total; any other error is returned at once.
    pub async fn classify(&self, text: &str) -> Result<Label, AnnotateError> {
        let prompt = build_prompt(text);
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.generate(&prompt).await {
                Ok(response) => {
                    tracing::debug!("Classifier returned {:?}", response);
                    return Ok(match match_category(&response) {
                        Ok(category) => Label::Category(category),
                        Err(e) => {
                            tracing::warn!("{}", e);
                            Label::Uncategorized
                        }
                    });
                }
                Err(e) if !e.is_transient() => {
                    tracing::warn!("Classifier call failed permanently: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        "Classifier attempt {}/{} failed: {}",
                        attempt,
                        self.max_retries,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        Err(AnnotateError::RetriesExhausted {
            attempts: self.max_retries,
            last: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    /// Sends one prompt and returns the answer text
    async fn generate(&self, prompt: &str) -> Result<String, AnnotateError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            message.truncate(
                message
                    .char_indices()
                    .nth(MAX_ERROR_BODY)
                    .map_or(message.len(), |(i, _)| i),
            );
            return Err(AnnotateError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.text)
            .filter(|text| !text.trim().is_empty())
            .ok_or(AnnotateError::EmptyResponse)
    }
}
