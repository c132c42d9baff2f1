//! Extraction Router: dispatches to one of the two strategies by `method`,
//! applying the retry/fallback policy that differs per method.

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::ExtractionMethod;
use crate::retry::{retry_with_backoff, RetryConfig};

use super::{docling, langextract, ExtractionContext};

/// Stateless dispatcher; holds no per-call mutable state (contrast with the
/// OCR Router's circuit breaker).
pub struct ExtractionRouter;

impl Default for ExtractionRouter {
    fn default() -> Self {
        Self
    }
}

impl ExtractionRouter {
    pub fn new() -> Self {
        Self
    }

    pub async fn route(&self, method: ExtractionMethod, ctx: &ExtractionContext) -> Result<crate::models::ExtractionResult> {
        match method {
            ExtractionMethod::Docling => docling::run(ctx).await,
            ExtractionMethod::Langextract => {
                retry_with_backoff(RetryConfig::STANDARD, Error::is_transient, || langextract::run(ctx)).await
            }
            ExtractionMethod::Auto => self.route_auto(ctx).await,
        }
    }

    async fn route_auto(&self, ctx: &ExtractionContext) -> Result<crate::models::ExtractionResult> {
        let attempt = retry_with_backoff(RetryConfig::STANDARD, Error::is_transient, || langextract::run(ctx)).await;

        match attempt {
            Ok(result) => Ok(result),
            Err(err) => {
                warn!(error = %err, "character-offset extraction exhausted, falling back to page-level strategy");
                let fallback = docling::run(ctx).await?;
                info!(method = "docling", "auto extraction fell back successfully");
                Ok(fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmClient, LlmExtraction, ModelTier};
    use crate::pipeline::chunker::ChunkConfig;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct AlwaysRateLimited {
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmClient for AlwaysRateLimited {
        async fn extract(&self, _s: &str, _p: &str, _schema: &Value, _tier: ModelTier) -> Result<LlmExtraction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::LlmTransient("429 rate limit".to_string()))
        }
    }

    struct SingleBorrowerLlm;

    #[async_trait]
    impl LlmClient for SingleBorrowerLlm {
        async fn extract(&self, _s: &str, _p: &str, _schema: &Value, _tier: ModelTier) -> Result<LlmExtraction> {
            Ok(LlmExtraction {
                parsed: json!({
                    "borrowers": [{
                        "full_name": "John Smith",
                        "sources": [{"snippet": "John Smith", "section": null}]
                    }]
                }),
                tokens: 50,
                finish_reason: "stop".to_string(),
            })
        }
    }

    fn ctx(llm: Arc<dyn LlmClient>) -> ExtractionContext {
        ExtractionContext {
            document_id: uuid::Uuid::new_v4(),
            filename: "loan.pdf".to_string(),
            raw_text: "John Smith applied for a loan.".to_string(),
            markdown_text: None,
            page_count: Some(1),
            llm,
            chunk_config: ChunkConfig::default(),
        }
    }

    #[tokio::test]
    async fn langextract_only_bubbles_up_after_exhausting_retries() {
        let llm = Arc::new(AlwaysRateLimited { calls: AtomicU32::new(0) });
        let router = ExtractionRouter::new();
        let context = ctx(llm.clone());
        let result = router.route(ExtractionMethod::Langextract, &context).await;
        assert!(result.is_err());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn auto_falls_back_to_docling_on_exhausted_transient_failure() {
        struct Switching {
            calls: AtomicU32,
        }
        #[async_trait]
        impl LlmClient for Switching {
            async fn extract(&self, system: &str, _p: &str, _schema: &Value, tier: ModelTier) -> Result<LlmExtraction> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if system.contains("extraction_text") {
                    Err(Error::LlmTransient("429 rate limit".to_string()))
                } else {
                    SingleBorrowerLlm.extract(system, _p, _schema, tier).await
                }
            }
        }

        let llm = Arc::new(Switching { calls: AtomicU32::new(0) });
        let router = ExtractionRouter::new();
        let context = ctx(llm);
        let result = router.route(ExtractionMethod::Auto, &context).await.unwrap();
        assert_eq!(result.method_used, ExtractionMethod::Docling);
    }

    #[tokio::test]
    async fn docling_alone_never_retries() {
        let llm = Arc::new(AlwaysRateLimited { calls: AtomicU32::new(0) });
        let router = ExtractionRouter::new();
        let context = ctx(llm.clone());
        let _ = router.route(ExtractionMethod::Docling, &context).await;
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }
}
