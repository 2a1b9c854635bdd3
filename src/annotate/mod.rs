//! Annotation stage: topic labels for downloaded papers
//!
//! Runs after a crawl, against the same database. Every paper without a
//! label (or labeled `Uncategorized` by an earlier pass) has its text
//! extracted, sent to a remote classifier, and is labeled with one of a
//! fixed set of categories.

mod classifier;
mod extract;

pub use classifier::{build_prompt, match_category, GeminiClassifier};
pub use extract::extract_text;

use crate::storage::{Storage, StorageError, UNCATEGORIZED_LABEL};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the annotation stage
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("Classifier answered outside the known categories: {response:?}")]
    ClassificationMismatch { response: String },

    #[error("File not found: {0}")]
    MissingFile(PathBuf),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("No text extracted from {0}")]
    EmptyText(PathBuf),

    #[error("Classifier API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Classifier API returned no text")]
    EmptyResponse,

    #[error("API key not set: environment variable {0} is missing or empty")]
    MissingApiKey(String),

    #[error("Classification failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnnotateError {
    /// Returns true if a later attempt at the same call might succeed
    ///
    /// Timeouts, connection failures, 429 and 5xx responses are transient,
    /// as is an answer without text. Everything else fails the same way on
    /// every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|status| {
                        status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
                    })
            }
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::EmptyResponse => true,
            _ => false,
        }
    }
}

/// Topic categories a paper can be labeled with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    DeepLearning,
    ComputerVision,
    ReinforcementLearning,
    Nlp,
    Optimization,
}

impl Category {
    /// All categories, in the order the classifier's answer is matched against
    pub const ALL: [Category; 5] = [
        Category::DeepLearning,
        Category::ComputerVision,
        Category::ReinforcementLearning,
        Category::Nlp,
        Category::Optimization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeepLearning => "Deep Learning",
            Self::ComputerVision => "Computer Vision",
            Self::ReinforcementLearning => "Reinforcement Learning",
            Self::Nlp => "NLP",
            Self::Optimization => "Optimization",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The label stored for a classified paper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Category(Category),
    /// The classifier answered, but with no known category
    Uncategorized,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category(category) => category.as_str(),
            Self::Uncategorized => UNCATEGORIZED_LABEL,
        }
    }
}

/// Counts from one annotation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationReport {
    /// Papers given a known category
    pub labeled: u64,

    /// Papers labeled `Uncategorized`
    pub uncategorized: u64,

    /// Papers skipped because no text could be extracted
    pub skipped: u64,

    /// Papers left unlabeled after the classifier kept failing
    pub failed: u64,
}

impl fmt::Display for AnnotationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Annotation Report ===")?;
        writeln!(f, "  Labeled: {}", self.labeled)?;
        writeln!(f, "  Uncategorized: {}", self.uncategorized)?;
        writeln!(f, "  Skipped (no text): {}", self.skipped)?;
        write!(f, "  Failed: {}", self.failed)
    }
}

/// Labels every unprocessed paper in `storage`
///
/// Papers are handled one at a time. A paper whose text cannot be extracted
/// is skipped, and one the classifier keeps failing on stays unlabeled so the
/// next pass picks it up again. Only storage errors abort the pass.
pub async fn run_annotation<S: Storage + ?Sized>(
    storage: &mut S,
    classifier: &GeminiClassifier,
) -> Result<AnnotationReport, AnnotateError> {
    let papers = storage.list_unprocessed()?;
    let mut report = AnnotationReport::default();

    if papers.is_empty() {
        tracing::info!("No unlabeled papers found");
        return Ok(report);
    }

    tracing::info!("Annotating {} papers", papers.len());

    for paper in papers {
        tracing::debug!("Annotating paper {} from {}", paper.id, paper.file_path);

        let text = match extract_text(Path::new(&paper.file_path)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Skipping paper {}: {}", paper.id, e);
                report.skipped += 1;
                continue;
            }
        };

        match classifier.classify(&text).await {
            Ok(label) => {
                storage.update_label(paper.id, label.as_str())?;
                tracing::info!("Paper {} classified as {}", paper.id, label.as_str());
                match label {
                    Label::Category(_) => report.labeled += 1,
                    Label::Uncategorized => report.uncategorized += 1,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to annotate paper {}: {}", paper.id, e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnnotatorConfig;
    use crate::storage::{NewPaper, SqliteStorage};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn classifier(server: &MockServer) -> GeminiClassifier {
        let config = AnnotatorConfig {
            endpoint: server.uri(),
            max_retries: 2,
            retry_delay_ms: 10,
            ..AnnotatorConfig::default()
        };
        GeminiClassifier::new(&config, "test-key".to_string()).unwrap()
    }

    fn answer(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
    }

    fn add_paper(storage: &mut SqliteStorage, temp_dir: &TempDir, name: &str, body: Option<&str>) -> i64 {
        let file_path = temp_dir.path().join(name);
        if let Some(body) = body {
            std::fs::write(&file_path, body).unwrap();
        }
        let paper = NewPaper {
            title: name.to_string(),
            authors: "Unknown Authors".to_string(),
            url: format!("https://papers.example.org/{}", name),
            file_path: file_path.to_string_lossy().into_owned(),
            year: "Unknown Year".to_string(),
        };
        storage.insert_if_absent(&paper, None).unwrap();
        storage.get_paper_by_url(&paper.url).unwrap().unwrap().id
    }

    #[test]
    fn test_label_strings() {
        assert_eq!(Label::Category(Category::Nlp).as_str(), "NLP");
        assert_eq!(Label::Uncategorized.as_str(), "Uncategorized");
        assert_eq!(Category::ReinforcementLearning.to_string(), "Reinforcement Learning");
    }

    #[tokio::test]
    async fn test_run_annotation_labels_and_skips() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .respond_with(answer(" Computer Vision\n"))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let text_id = add_paper(&mut storage, &temp_dir, "detector.txt", Some("Object detection"));
        let missing_id = add_paper(&mut storage, &temp_dir, "missing.txt", None);
        let empty_id = add_paper(&mut storage, &temp_dir, "empty.txt", Some("   \n"));

        let report = run_annotation(&mut storage, &classifier(&server)).await.unwrap();

        assert_eq!(
            report,
            AnnotationReport {
                labeled: 1,
                skipped: 2,
                ..AnnotationReport::default()
            }
        );
        assert_eq!(
            storage.get_paper(text_id).unwrap().label.as_deref(),
            Some("Computer Vision")
        );
        assert_eq!(storage.get_paper(missing_id).unwrap().label, None);
        assert_eq!(storage.get_paper(empty_id).unwrap().label, None);
    }

    #[tokio::test]
    async fn test_unknown_answer_is_uncategorized_and_retried_next_pass() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(answer("Quantum Biology"))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let id = add_paper(&mut storage, &temp_dir, "paper.txt", Some("Some text"));

        let report = run_annotation(&mut storage, &classifier(&server)).await.unwrap();

        assert_eq!(report.uncategorized, 1);
        assert_eq!(
            storage.get_paper(id).unwrap().label.as_deref(),
            Some(UNCATEGORIZED_LABEL)
        );
        assert_eq!(storage.list_unprocessed().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_leave_paper_unlabeled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let id = add_paper(&mut storage, &temp_dir, "paper.txt", Some("Some text"));

        let report = run_annotation(&mut storage, &classifier(&server)).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(storage.get_paper(id).unwrap().label, None);
    }

    #[tokio::test]
    async fn test_nothing_to_annotate() {
        let server = MockServer::start().await;
        let mut storage = SqliteStorage::open_in_memory().unwrap();

        let report = run_annotation(&mut storage, &classifier(&server)).await.unwrap();
        assert_eq!(report, AnnotationReport::default());
    }
}
