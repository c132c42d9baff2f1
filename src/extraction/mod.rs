//! Extraction strategies and the router that dispatches between them.

pub mod docling;
pub mod langextract;
pub mod router;
pub mod schema;

use std::sync::Arc;
use uuid::Uuid;

use crate::llm::LlmClient;
use crate::models::{BorrowerRecord, ConsistencyWarning, ExtractionResult};
use crate::pipeline::chunker::ChunkConfig;
use crate::pipeline::{confidence, consistency, dedup, validation};

/// Everything an extraction strategy needs to run once, independent of
/// which strategy is selected.
pub struct ExtractionContext {
    pub document_id: Uuid,
    pub filename: String,
    pub raw_text: String,
    pub markdown_text: Option<String>,
    pub page_count: Option<u32>,
    pub llm: Arc<dyn LlmClient>,
    pub chunk_config: ChunkConfig,
}

/// Runs dedup -> validate -> score -> consistency over a strategy's raw
/// borrower list, shared by both Docling-style and LangExtract-style
/// extractors. Dedup runs first so validation, scoring, and consistency
/// checks all see the merged borrower set rather than per-chunk duplicates.
pub fn finish(borrowers: Vec<BorrowerRecord>) -> (Vec<BorrowerRecord>, Vec<String>, Vec<ConsistencyWarning>) {
    let mut merged = dedup::dedup(borrowers);

    let mut validation_errors = Vec::new();
    for (index, record) in merged.iter().enumerate() {
        collect_validation_errors(index, record, &mut validation_errors);
    }

    for record in merged.iter_mut() {
        confidence::apply(record);
    }

    let consistency_warnings = consistency::check(&merged);

    (merged, validation_errors, consistency_warnings)
}

fn collect_validation_errors(index: usize, record: &BorrowerRecord, errors: &mut Vec<String>) {
    if let Some(ssn) = &record.raw_ssn {
        let result = validation::validate_ssn(ssn);
        if !result.ok {
            errors.push(format!("borrower {index}: SSN invalid: {}", result.reason.unwrap_or_default()));
        }
    }
    if let Some(phone) = &record.phone {
        let result = validation::validate_phone(phone);
        if !result.ok {
            errors.push(format!("borrower {index}: phone invalid: {}", result.reason.unwrap_or_default()));
        }
    }
    if let Some(zip) = &record.zip {
        let result = validation::validate_zip(zip);
        if !result.ok {
            errors.push(format!("borrower {index}: ZIP invalid: {}", result.reason.unwrap_or_default()));
        }
    }
    for income in &record.income_history {
        let result = validation::validate_year(income.year);
        if !result.ok {
            errors.push(format!("borrower {index}: income year invalid: {}", result.reason.unwrap_or_default()));
        }
    }
}

pub(crate) fn empty_result(method: crate::models::ExtractionMethod) -> ExtractionResult {
    ExtractionResult {
        borrowers: Vec::new(),
        chunks_processed: 0,
        approx_tokens: 0,
        validation_errors: Vec::new(),
        consistency_warnings: Vec::new(),
        method_used: method,
    }
}
