use crate::config::types::{AnnotatorConfig, Config, CrawlerConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    validate_annotator_config(&config.annotator)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let root = Url::parse(&config.root_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid root_url: {}", e)))?;

    if root.scheme() != "http" && root.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "root_url '{}' must use HTTP or HTTPS",
            config.root_url
        )));
    }

    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 64, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.year_filter.is_empty() {
        return Err(ConfigError::Validation(
            "year_filter must contain at least one token".to_string(),
        ));
    }

    if config.year_filter.iter().any(|token| token.is_empty()) {
        return Err(ConfigError::Validation(
            "year_filter cannot contain empty tokens".to_string(),
        ));
    }

    validate_artifact_extensions(&config.artifact_extensions)?;

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates artifact extensions: non-empty list of bare alphanumeric suffixes
fn validate_artifact_extensions(extensions: &[String]) -> Result<(), ConfigError> {
    if extensions.is_empty() {
        return Err(ConfigError::Validation(
            "artifact_extensions must contain at least one extension".to_string(),
        ));
    }

    for ext in extensions {
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(format!(
                "artifact extension '{}' must be alphanumeric without a leading dot",
                ext
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.download_folder.is_empty() {
        return Err(ConfigError::Validation(
            "download_folder cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates annotator configuration
fn validate_annotator_config(config: &AnnotatorConfig) -> Result<(), ConfigError> {
    Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid annotator endpoint: {}", e)))?;

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "annotator model cannot be empty".to_string(),
        ));
    }

    if config.api_key_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "annotator api_key_env cannot be empty".to_string(),
        ));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "annotator max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    Ok(())
}
