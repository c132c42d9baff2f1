//! LangExtract-style (character-offset) extraction strategy: every field
//! carries a verbatim `extraction_text` span, translated to raw-text offsets
//! via the Offset Translator.

use futures::stream::{self, StreamExt};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::llm::ModelTier;
use crate::models::{ExtractionMethod, ExtractionResult};
use crate::pipeline::chunker;
use crate::pipeline::complexity;
use crate::pipeline::offset::OffsetTranslator;

use super::schema::{borrower_list_schema, parse_llm_borrowers, to_borrower_record};
use super::ExtractionContext;

const SYSTEM_PROMPT: &str = "Extract every borrower mentioned in this loan document chunk. \
    For every field, report the exact verbatim text span (extraction_text) as it appears in the \
    supplied chunk, along with a short supporting snippet.";

/// Chunk calls to the LLM run concurrently, bounded so one large document
/// cannot open unbounded concurrent requests against the LLM service.
const MAX_CONCURRENT_CHUNKS: usize = 4;

#[instrument(skip(ctx), fields(document_id = %ctx.document_id))]
pub async fn run(ctx: &ExtractionContext) -> Result<ExtractionResult> {
    let assessment = complexity::classify(&ctx.raw_text, ctx.page_count);
    let tier = match assessment.level {
        crate::models::ComplexityLevel::Standard => ModelTier::Flash,
        crate::models::ComplexityLevel::Complex => ModelTier::Pro,
    };

    let source_text = ctx.markdown_text.as_deref().unwrap_or(&ctx.raw_text);
    let chunks = chunker::chunk_text(source_text, ctx.chunk_config);
    let schema = borrower_list_schema(true);
    let translator = OffsetTranslator::new(&ctx.raw_text, ctx.markdown_text.as_deref());

    let results: Vec<Result<(u64, Vec<_>)>> = stream::iter(chunks.iter())
        .map(|chunk| {
            let schema = &schema;
            let translator = &translator;
            async move {
                let extraction = ctx.llm.extract(SYSTEM_PROMPT, &chunk.text, schema, tier).await?;
                let emitted = parse_llm_borrowers(&extraction.parsed)?;
                let page_number = (chunk.index as u32) + 1;

                let mut records = Vec::with_capacity(emitted.len());
                for out in emitted {
                    let spans: Vec<Option<(usize, usize)>> = out
                        .sources
                        .iter()
                        .map(|source| resolve_span(translator, ctx.markdown_text.is_some(), source))
                        .collect();

                    let mut record = to_borrower_record(out, ctx.document_id, page_number);
                    for (source, span) in record.sources.iter_mut().zip(spans) {
                        if let Some((start, end)) = span {
                            source.char_start = Some(start);
                            source.char_end = Some(end);
                        }
                    }
                    records.push(record);
                }
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
        method_used: ExtractionMethod::Langextract,
    })
}

fn resolve_span(
    translator: &OffsetTranslator,
    has_markdown: bool,
    source: &super::schema::LlmSourceOut,
) -> Option<(usize, usize)> {
    let extraction_text = source.extraction_text.as_ref()?;
    if extraction_text.is_empty() {
        return None;
    }

    let span = if has_markdown {
        translator.locate_in_markdown(extraction_text)
    } else {
        translator.locate_in_raw(extraction_text)
    }?;

    translator.to_raw(span.0, span.1, extraction_text)
}
