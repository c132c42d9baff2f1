//! Domain types shared across the pipeline.
//!
//! These are semantic types, not storage encodings — persistence is handled
//! by the repository traits in [`crate::repository`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Fixed-point money amount, stored as whole cents.
///
/// No decimal crate in the dependency stack; a thin newtype over `i64`
/// matches the habit of wrapping primitives at domain boundaries (`Uuid`,
/// `DateTime<Utc>`) rather than passing raw numbers around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(pub i64);

impl Money {
    pub fn from_dollars(dollars: f64) -> Self {
        Self((dollars * 100.0).round() as i64)
    }

    pub fn dollars(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

/// Status of a [`Document`] as it moves through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

/// The extraction strategy requested or used for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Docling,
    Langextract,
    Auto,
}

impl ExtractionMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "docling" => Some(Self::Docling),
            "langextract" => Some(Self::Langextract),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Docling => "docling",
            Self::Langextract => "langextract",
            Self::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

/// OCR decision mode requested for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrMode {
    Auto,
    Force,
    Skip,
}

impl OcrMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "force" => Some(Self::Force),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

impl std::fmt::Display for OcrMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Force => "force",
            Self::Skip => "skip",
        };
        write!(f, "{s}")
    }
}

/// A single uploaded loan document and its processing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    pub content_hash: String,
    pub file_size_bytes: u64,
    pub file_type: String,
    pub blob_uri: String,
    pub status: DocumentStatus,
    pub page_count: Option<u32>,
    pub error_message: Option<String>,
    pub extraction_method: Option<ExtractionMethod>,
    pub ocr_processed: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        filename: impl Into<String>,
        content_hash: impl Into<String>,
        file_size_bytes: u64,
        file_type: impl Into<String>,
        blob_uri: impl Into<String>,
        method: ExtractionMethod,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            content_hash: content_hash.into(),
            file_size_bytes,
            file_type: file_type.into(),
            blob_uri: blob_uri.into(),
            status: DocumentStatus::Pending,
            page_count: None,
            error_message: None,
            extraction_method: Some(method),
            ocr_processed: None,
            created_at: Utc::now(),
        }
    }
}

/// Period over which an [`IncomeRecord`] amount applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomePeriod {
    Annual,
    Monthly,
    Weekly,
    Biweekly,
}

impl IncomePeriod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "annual" => Some(Self::Annual),
            "monthly" => Some(Self::Monthly),
            "weekly" => Some(Self::Weekly),
            "biweekly" => Some(Self::Biweekly),
            _ => None,
        }
    }
}

/// Coarse income source classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncomeSourceType {
    Employment,
    SelfEmployment,
    Other(String),
}

impl IncomeSourceType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "employment" => Self::Employment,
            "self-employment" | "self_employment" => Self::SelfEmployment,
            other => Self::Other(other.to_string()),
        }
    }
}

/// An income entry owned by a [`Borrower`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeRecord {
    pub amount: Money,
    pub period: IncomePeriod,
    pub year: i32,
    pub source_type: IncomeSourceType,
    pub employer: Option<String>,
}

/// A bank or loan account number owned by a [`Borrower`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountNumber {
    pub number: String,
    pub account_type: AccountType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Bank,
    Loan,
}

/// Per-field provenance for an extracted value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReference {
    pub document_id: Uuid,
    pub page_number: u32,
    pub section: Option<String>,
    pub snippet: String,
    pub char_start: Option<usize>,
    pub char_end: Option<usize>,
}

impl SourceReference {
    /// Whether the offset pair is well-formed: both present and ordered, or
    /// both absent.
    pub fn offsets_valid(&self) -> bool {
        match (self.char_start, self.char_end) {
            (Some(start), Some(end)) => start < end,
            (None, None) => true,
            _ => false,
        }
    }
}

/// Address, kept as a serialized value: no canonical structured schema
/// holds across loan document types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address(pub serde_json::Value);

/// A persisted borrower and the fields we track confidence against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Borrower {
    pub id: Uuid,
    pub document_id: Uuid,
    pub full_name: String,
    pub ssn_hash: Option<String>,
    pub address: Option<Address>,
    pub confidence_score: f64,
    pub income_history: Vec<IncomeRecord>,
    pub account_numbers: Vec<AccountNumber>,
    pub sources: Vec<SourceReference>,
    pub needs_review: bool,
    pub created_at: DateTime<Utc>,
}

impl Borrower {
    pub fn clamp_confidence(&mut self) {
        self.confidence_score = self.confidence_score.clamp(0.0, 1.0);
    }
}

/// Transient, pre-persistence shape produced by an extraction strategy,
/// before SSN hashing/address serialization and before a `Document` id is
/// attached to its sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowerRecord {
    pub full_name: String,
    /// Raw SSN as seen in the document text, if any — never persisted as-is.
    pub raw_ssn: Option<String>,
    pub phone: Option<String>,
    pub zip: Option<String>,
    pub address: Option<serde_json::Value>,
    pub income_history: Vec<IncomeRecord>,
    pub account_numbers: Vec<AccountNumber>,
    pub sources: Vec<SourceReference>,
    pub confidence_score: f64,
    pub needs_review: bool,
}

impl BorrowerRecord {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            raw_ssn: None,
            phone: None,
            zip: None,
            address: None,
            income_history: Vec::new(),
            account_numbers: Vec::new(),
            sources: Vec::new(),
            confidence_score: 0.0,
            needs_review: false,
        }
    }
}

/// A warning raised by the consistency checker; never auto-resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyWarning {
    pub kind: ConsistencyWarningKind,
    pub borrower_index: usize,
    pub field: String,
    pub message: String,
    pub details: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyWarningKind {
    AddressConflict,
    IncomeDrop,
    IncomeSpike,
    CrossDocMismatch,
}

/// Output of an extraction strategy before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub borrowers: Vec<BorrowerRecord>,
    pub chunks_processed: usize,
    pub approx_tokens: u64,
    pub validation_errors: Vec<String>,
    pub consistency_warnings: Vec<ConsistencyWarning>,
    pub method_used: ExtractionMethod,
}

/// Complexity tier assigned to a document by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplexityLevel {
    Standard,
    Complex,
}

/// Output of the complexity classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityAssessment {
    pub level: ComplexityLevel,
    pub estimated_borrowers: usize,
    pub has_handwritten: bool,
    pub has_poor_quality: bool,
}
