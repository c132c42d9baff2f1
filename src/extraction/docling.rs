//! Docling-style (page-level) extraction strategy: simple and cheap, no
//! character offsets — only page numbers.

use futures::stream::{self, StreamExt};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::llm::ModelTier;
use crate::models::{ExtractionMethod, ExtractionResult};
use crate::pipeline::chunker;
use crate::pipeline::complexity;

use super::schema::{borrower_list_schema, parse_llm_borrowers, to_borrower_record};
use super::ExtractionContext;

const SYSTEM_PROMPT: &str = "Extract every borrower mentioned in this loan document chunk, \
    including income history, account numbers, and a short verbatim snippet supporting each field.";

/// Chunk calls to the LLM run concurrently, bounded so one large document
/// cannot open unbounded concurrent requests against the LLM service.
const MAX_CONCURRENT_CHUNKS: usize = 4;

/// Runs the page-level extraction strategy once over the whole document
/// (no internal retries — the router owns retry/fallback policy).
#[instrument(skip(ctx), fields(document_id = %ctx.document_id))]
pub async fn run(ctx: &ExtractionContext) -> Result<ExtractionResult> {
    let assessment = complexity::classify(&ctx.raw_text, ctx.page_count);
    let tier = match assessment.level {
        crate::models::ComplexityLevel::Standard => ModelTier::Flash,
        crate::models::ComplexityLevel::Complex => ModelTier::Pro,
    };

    let chunks = chunker::chunk_text(&ctx.raw_text, ctx.chunk_config);
    let schema = borrower_list_schema(false);

    let results: Vec<Result<(u64, Vec<_>)>> = stream::iter(chunks.iter())
        .map(|chunk| {
            let schema = &schema;
            async move {
                let extraction = ctx.llm.extract(SYSTEM_PROMPT, &chunk.text, schema, tier).await?;
                let emitted = parse_llm_borrowers(&extraction.parsed)?;
                let page_number = (chunk.index as u32) + 1;
                let records: Vec<_> = emitted
                    .into_iter()
                    .map(|borrower| to_borrower_record(borrower, ctx.document_id, page_number))
                    .collect();
                Ok::<_, Error>((extraction.tokens, records))
            }
        })
        .buffer_unordered(MAX_CONCURRENT_CHUNKS)
        .collect()
        .await;

    let mut raw_borrowers = Vec::new();
    let mut approx_tokens = 0u64;
    for result in results {
        let (tokens, records) = result?;
        approx_tokens += tokens;
        raw_borrowers.extend(records);
    }

    let (borrowers, validation_errors, consistency_warnings) = super::finish(raw_borrowers);

    Ok(ExtractionResult {
        borrowers,
        chunks_processed: chunks.len(),
        approx_tokens,
        validation_errors,
        consistency_warnings,
        method_used: ExtractionMethod::Docling,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmExtraction;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct FixtureLlm;

    #[async_trait]
    impl crate::llm::LlmClient for FixtureLlm {
        async fn extract(
            &self,
            _system: &str,
            _prompt: &str,
            _schema: &serde_json::Value,
            _tier: ModelTier,
        ) -> Result<LlmExtraction> {
            Ok(LlmExtraction {
                parsed: json!({
                    "borrowers": [{
                        "full_name": "John Smith",
                        "ssn": null,
                        "phone": null,
                        "zip": null,
                        "address": null,
                        "income_history": [
                            {"amount_cents": 7_500_000, "period": "annual", "year": 2024, "source_type": "employment", "employer": null},
                            {"amount_cents": 7_200_000, "period": "annual", "year": 2023, "source_type": "employment", "employer": null}
                        ],
                        "account_numbers": [],
                        "sources": [{"snippet": "John Smith", "section": null}]
                    }]
                }),
                tokens: 120,
                finish_reason: "stop".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn produces_one_borrower_with_two_income_records() {
        let ctx = ExtractionContext {
            document_id: uuid::Uuid::new_v4(),
            filename: "loan.pdf".to_string(),
            raw_text: "John Smith applied for a loan.".to_string(),
            markdown_text: None,
            page_count: Some(2),
            llm: Arc::new(FixtureLlm),
            chunk_config: chunker::ChunkConfig::default(),
        };

        let result = run(&ctx).await.unwrap();
        assert_eq!(result.borrowers.len(), 1);
        assert_eq!(result.borrowers[0].full_name, "John Smith");
        assert_eq!(result.borrowers[0].income_history.len(), 2);
        assert!(result.borrowers[0].sources[0].char_start.is_none());
        assert_eq!(result.method_used, ExtractionMethod::Docling);
    }
}
