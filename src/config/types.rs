use serde::Deserialize;

/// Main configuration structure for Paper-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub annotator: AnnotatorConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Index page the crawl starts from (depth 0)
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// Maximum traversal depth; pages deeper than this are never fetched
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Upper bound on HTTP requests in flight at once
    #[serde(
        rename = "max-concurrent-requests",
        default = "default_max_concurrent_requests"
    )]
    pub max_concurrent_requests: u32,

    /// Tokens selecting which index-page links are worth descending into
    #[serde(rename = "year-filter")]
    pub year_filter: Vec<String>,

    /// What part of an index-page link the year tokens are matched against
    #[serde(rename = "year-match", default)]
    pub year_match: YearMatch,

    /// File suffixes (without the dot) that mark a link as a downloadable artifact
    #[serde(
        rename = "artifact-extensions",
        default = "default_artifact_extensions"
    )]
    pub artifact_extensions: Vec<String>,

    /// Per-request timeout in seconds
    #[serde(
        rename = "request-timeout-secs",
        default = "default_request_timeout_secs"
    )]
    pub request_timeout_secs: u64,

    /// Skip TLS certificate validation for the target site
    #[serde(rename = "accept-invalid-certs", default = "default_true")]
    pub accept_invalid_certs: bool,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Store the year token that selected a listing page instead of "Unknown Year"
    #[serde(rename = "infer-year-from-index", default)]
    pub infer_year_from_index: bool,
}

/// Where the year filter looks on an index-page link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum YearMatch {
    /// Match against the anchor's visible text
    #[default]
    AnchorText,
    /// Match against the resolved link target
    Url,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory downloaded artifacts are written to
    #[serde(rename = "download-folder")]
    pub download_folder: String,
}

/// Remote classifier configuration for the annotation stage
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotatorConfig {
    /// Base URL of the generative language API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name used for classification
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Attempts per paper before giving up
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_concurrent_requests() -> u32 {
    8
}

fn default_artifact_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "txt".to_string()]
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("paper-harvest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}
