//! Error types for the document extraction pipeline.

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur anywhere in the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// A document with the same content hash already exists.
    #[error("duplicate document: {0}")]
    DuplicateDocument(String),

    /// Malformed input (bad method, bad id, unsupported MIME type).
    #[error("validation failed: {0}")]
    ValidationFailure(String),

    /// Blob store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Entry not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// LLM call failed in a way that may succeed on retry.
    #[error("LLM transient error: {0}")]
    LlmTransient(String),

    /// LLM call failed in a way retrying will not fix.
    #[error("LLM fatal error: {0}")]
    LlmFatal(String),

    /// The LLM response was truncated before completion.
    #[error("LLM response truncated: {0}")]
    LlmTruncation(String),

    /// OCR call failed in a way that may succeed on retry.
    #[error("OCR transient error: {0}")]
    OcrTransient(String),

    /// OCR call failed in a way retrying will not fix.
    #[error("OCR fatal error: {0}")]
    OcrFatal(String),

    /// A single borrower failed to persist; the batch is not aborted.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Ingest/parsing error (PDF, DOCX, plain text).
    #[error("ingest error: {0}")]
    Ingest(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A processing step should be retried by the task queue.
    ///
    /// Not a user-facing failure: the task handler translates this into a
    /// retry-eligible response rather than a terminal `Document` status.
    #[error("retryable: {0}")]
    Retryable(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::DuplicateDocument(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailure(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn ingest(msg: impl Into<String>) -> Self {
        Self::Ingest(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Whether this error represents a transient condition that a retry (at
    /// the LLM-client, strategy-router, or task-queue layer) might resolve.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::LlmTransient(_) | Error::OcrTransient(_) | Error::Retryable(_)
        )
    }
}

/// Classifies a raw error message from an opaque remote-service SDK into
/// transient or fatal by a fixed set of substring markers.
///
/// Transient if the message contains (case-insensitive) any of: `rate limit`,
/// `timeout`, `deadline exceeded`, `resource exhausted`, `unavailable`, `503`,
/// `429`. Fatal otherwise, including empty/null messages.
pub fn classify_transient(message: &str) -> bool {
    if message.trim().is_empty() {
        return false;
    }
    let lower = message.to_lowercase();
    const MARKERS: &[&str] = &[
        "rate limit",
        "timeout",
        "deadline exceeded",
        "resource exhausted",
        "unavailable",
        "503",
        "429",
    ];
    MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_transient_markers() {
        assert!(classify_transient("Rate limit exceeded, try again"));
        assert!(classify_transient("request timeout after 30s"));
        assert!(classify_transient("Deadline Exceeded"));
        assert!(classify_transient("RESOURCE_EXHAUSTED: quota"));
        assert!(classify_transient("service unavailable"));
        assert!(classify_transient("HTTP 503"));
        assert!(classify_transient("429 Too Many Requests"));
    }

    #[test]
    fn treats_empty_and_other_messages_as_fatal() {
        assert!(!classify_transient(""));
        assert!(!classify_transient("   "));
        assert!(!classify_transient("invalid schema"));
        assert!(!classify_transient("authentication failed"));
    }
}
