//! Process configuration, loaded from environment variables.
//!
//! Plain fields with `Default` plus `with_*` builder methods, the same shape
//! `KnowledgeBaseConfig` uses, rather than a config-parsing crate.

use std::env;
use std::time::Duration;

/// Top-level configuration for the document extraction pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the LLM service.
    pub llm_api_key: String,
    /// Base URL for the LLM service.
    pub llm_base_url: String,
    /// Base URL for the remote GPU OCR service. Empty disables the GPU path.
    pub ocr_service_url: String,
    /// Bearer token used to authenticate to the OCR service.
    pub ocr_service_token: String,
    /// Blob store bucket name.
    pub blob_bucket: String,
    /// Task queue path/name.
    pub queue_path: String,
    /// Maximum number of queue re-deliveries before a Document is marked FAILED.
    pub max_retry_count: u32,
    /// Default maximum characters per chunk.
    pub chunk_max_chars: usize,
    /// Default overlap characters between chunks.
    pub chunk_overlap_chars: usize,
    /// Timeout for a single LLM call.
    pub llm_timeout: Duration,
    /// Timeout for a single OCR call.
    pub ocr_timeout: Duration,
    /// Timeout for a single blob store call.
    pub blob_timeout: Duration,
    /// Consecutive failures before the OCR circuit breaker opens.
    pub breaker_failure_threshold: u32,
    /// Cooldown before a half-open probe is attempted.
    pub breaker_cooldown: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_base_url: "https://api.openai.com/v1".to_string(),
            ocr_service_url: String::new(),
            ocr_service_token: String::new(),
            blob_bucket: "loan-documents".to_string(),
            queue_path: "document-processing".to_string(),
            max_retry_count: 4,
            chunk_max_chars: 16_000,
            chunk_overlap_chars: 800,
            llm_timeout: Duration::from_secs(60),
            ocr_timeout: Duration::from_secs(120),
            blob_timeout: Duration::from_secs(30),
            breaker_failure_threshold: 3,
            breaker_cooldown: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            llm_api_key: env::var("LLM_API_KEY").unwrap_or(defaults.llm_api_key),
            llm_base_url: env::var("LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            ocr_service_url: env::var("OCR_SERVICE_URL").unwrap_or(defaults.ocr_service_url),
            ocr_service_token: env::var("OCR_SERVICE_TOKEN").unwrap_or(defaults.ocr_service_token),
            blob_bucket: env::var("BLOB_BUCKET").unwrap_or(defaults.blob_bucket),
            queue_path: env::var("QUEUE_PATH").unwrap_or(defaults.queue_path),
            max_retry_count: env_parse("MAX_RETRY_COUNT", defaults.max_retry_count),
            chunk_max_chars: env_parse("CHUNK_MAX_CHARS", defaults.chunk_max_chars),
            chunk_overlap_chars: env_parse("CHUNK_OVERLAP_CHARS", defaults.chunk_overlap_chars),
            ..defaults
        }
    }

    /// Whether a remote GPU OCR service is configured.
    pub fn ocr_enabled(&self) -> bool {
        !self.ocr_service_url.is_empty()
    }

    pub fn with_llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.llm_api_key = key.into();
        self
    }

    pub fn with_ocr_service_url(mut self, url: impl Into<String>) -> Self {
        self.ocr_service_url = url.into();
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
