//! Shared wire shape for both extraction strategies' LLM responses, and the
//! conversion from that shape into a canonical [`BorrowerRecord`].

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::models::{AccountNumber, AccountType, BorrowerRecord, IncomePeriod, IncomeRecord, IncomeSourceType, Money, SourceReference};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct LlmBorrowersOut {
    pub borrowers: Vec<LlmBorrowerOut>,
}

#[derive(Debug, Deserialize)]
pub struct LlmBorrowerOut {
    pub full_name: String,
    #[serde(default)]
    pub ssn: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub address: Option<Value>,
    #[serde(default)]
    pub income_history: Vec<LlmIncomeOut>,
    #[serde(default)]
    pub account_numbers: Vec<LlmAccountOut>,
    #[serde(default)]
    pub sources: Vec<LlmSourceOut>,
}

#[derive(Debug, Deserialize)]
pub struct LlmIncomeOut {
    pub amount_cents: i64,
    pub period: String,
    pub year: i32,
    pub source_type: String,
    #[serde(default)]
    pub employer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LlmAccountOut {
    pub number: String,
    pub account_type: String,
}

#[derive(Debug, Deserialize)]
pub struct LlmSourceOut {
    pub snippet: String,
    #[serde(default)]
    pub section: Option<String>,
    /// Verbatim span as it appears in the text fed to the model. Present
    /// only for the character-offset (LangExtract-style) strategy.
    #[serde(default)]
    pub extraction_text: Option<String>,
}

/// JSON schema passed to the LLM client's structured-output request.
/// `with_extraction_text` selects the LangExtract-style per-field verbatim
/// span requirement.
pub fn borrower_list_schema(with_extraction_text: bool) -> Value {
    let mut source_properties = json!({
        "snippet": {"type": "string", "maxLength": 500},
        "section": {"type": ["string", "null"]},
    });
    if with_extraction_text {
        source_properties["extraction_text"] = json!({"type": "string"});
    }

    json!({
        "type": "object",
        "properties": {
            "borrowers": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "full_name": {"type": "string"},
                        "ssn": {"type": ["string", "null"]},
                        "phone": {"type": ["string", "null"]},
                        "zip": {"type": ["string", "null"]},
                        "address": {"type": ["object", "null"]},
                        "income_history": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "amount_cents": {"type": "integer"},
                                    "period": {"type": "string"},
                                    "year": {"type": "integer"},
                                    "source_type": {"type": "string"},
                                    "employer": {"type": ["string", "null"]},
                                },
                                "required": ["amount_cents", "period", "year", "source_type"],
                            },
                        },
                        "account_numbers": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "number": {"type": "string"},
                                    "account_type": {"type": "string"},
                                },
                                "required": ["number", "account_type"],
                            },
                        },
                        "sources": {"type": "array", "items": source_properties},
                    },
                    "required": ["full_name", "sources"],
                },
            },
        },
        "required": ["borrowers"],
    })
}

pub fn parse_llm_borrowers(value: &Value) -> Result<Vec<LlmBorrowerOut>> {
    let parsed: LlmBorrowersOut = serde_json::from_value(value.clone())
        .map_err(|err| Error::LlmFatal(format!("response did not match borrower schema: {err}")))?;
    Ok(parsed.borrowers)
}

/// Converts one LLM-emitted borrower into the canonical shape, attaching
/// page-level provenance. Character offsets are left null here; the
/// character-offset strategy fills them in after running the offset
/// translator.
pub fn to_borrower_record(out: LlmBorrowerOut, document_id: Uuid, page_number: u32) -> BorrowerRecord {
    let income_history = out
        .income_history
        .into_iter()
        .filter_map(|income| {
            let period = IncomePeriod::parse(&income.period)?;
            let amount = Money(income.amount_cents);
            if !amount.is_positive() {
                return None;
            }
            if !(1900..=2100).contains(&income.year) {
                return None;
            }
            Some(IncomeRecord {
                amount,
                period,
                year: income.year,
                source_type: IncomeSourceType::parse(&income.source_type),
                employer: income.employer,
            })
        })
        .collect();

    let account_numbers = out
        .account_numbers
        .into_iter()
        .filter_map(|account| {
            let account_type = match account.account_type.trim().to_ascii_lowercase().as_str() {
                "bank" => AccountType::Bank,
                "loan" => AccountType::Loan,
                _ => return None,
            };
            Some(AccountNumber { number: account.number, account_type })
        })
        .collect();

    let sources = out
        .sources
        .iter()
        .map(|source| SourceReference {
            document_id,
            page_number,
            section: source.section.clone(),
            snippet: truncate_snippet(&source.snippet),
            char_start: None,
            char_end: None,
        })
        .collect();

    BorrowerRecord {
        full_name: out.full_name,
        raw_ssn: out.ssn,
        phone: out.phone,
        zip: out.zip,
        address: out.address,
        income_history,
        account_numbers,
        sources,
        confidence_score: 0.0,
        needs_review: false,
    }
}

fn truncate_snippet(snippet: &str) -> String {
    if snippet.chars().count() <= 500 {
        snippet.to_string()
    } else {
        snippet.chars().take(500).collect()
    }
}
