//! Text extraction from downloaded artifacts

use crate::annotate::AnnotateError;
use std::path::Path;

/// Reads the text content of a downloaded paper
///
/// `.txt` files are read as UTF-8. `.pdf` files go through `pdf-extract` on
/// a blocking thread, since extraction is CPU-bound and synchronous. Any
/// other extension is rejected, and a file yielding only whitespace is
/// reported as [`AnnotateError::EmptyText`].
pub async fn extract_text(path: &Path) -> Result<String, AnnotateError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(AnnotateError::MissingFile(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let text = match extension.as_deref() {
        Some("txt") => tokio::fs::read_to_string(path).await?,
        Some("pdf") => {
            let owned = path.to_path_buf();
            tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
                .await
                .map_err(|e| AnnotateError::Extraction(e.to_string()))?
                .map_err(|e| AnnotateError::Extraction(e.to_string()))?
        }
        _ => return Err(AnnotateError::UnsupportedFormat(path.to_path_buf())),
    };

    if text.trim().is_empty() {
        tracing::debug!("Extracted empty text from {}", path.display());
        return Err(AnnotateError::EmptyText(path.to_path_buf()));
    }

    Ok(text)
}
