//! # loanpipe
//!
//! A document extraction pipeline for loan-origination paperwork: upload a
//! PDF/DOCX/scanned image, route it through OCR and an LLM-backed extraction
//! strategy, and end up with deduplicated, confidence-scored borrower
//! records with field-level provenance.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            loanpipe                              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐   ┌───────────────┐   ┌──────────────────────────┐  │
//! │  │  HTTP   │   │ DocumentService│   │      Task Queue          │  │
//! │  │  API    │──▶│ upload/process │◀──│  (async mode consumer)   │  │
//! │  └─────────┘   └───────┬───────┘   └──────────────────────────┘  │
//! │                        │                                          │
//! │       ┌────────────────┼────────────────────┐                    │
//! │       ▼                ▼                    ▼                    │
//! │  ┌─────────┐     ┌───────────┐        ┌─────────────┐            │
//! │  │  Blob   │     │ OCR Router │        │ Extraction  │            │
//! │  │  Store  │     │ (breaker)  │        │   Router    │            │
//! │  └─────────┘     └───────────┘        └──────┬──────┘            │
//! │                                               │                   │
//! │                         ┌─────────────────────┴────────┐          │
//! │                         ▼                               ▼          │
//! │                    docling (page-level)         langextract (offsets)│
//! │                         └─────────────────┬────────────┘          │
//! │                                           ▼                       │
//! │                    dedup → validate → score → consistency         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use loanpipe::blob::InMemoryBlobStore;
//! use loanpipe::config::Config;
//! use loanpipe::extraction::router::ExtractionRouter;
//! use loanpipe::models::{ExtractionMethod, OcrMode};
//! use loanpipe::ocr::{HeuristicScannedDetector, HttpOcrClient, OcrRouter};
//! use loanpipe::repository::{InMemoryBorrowerRepository, InMemoryDocumentRepository};
//! use loanpipe::service::{Deps, DocumentService};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # struct NoopLlm;
//! # #[async_trait::async_trait]
//! # impl loanpipe::llm::LlmClient for NoopLlm {
//! #     async fn extract(&self, _: &str, _: &str, _: &serde_json::Value, _: loanpipe::llm::ModelTier)
//! #         -> loanpipe::error::Result<loanpipe::llm::LlmExtraction> {
//! #         unimplemented!()
//! #     }
//! # }
//! #[tokio::main]
//! async fn main() -> loanpipe::error::Result<()> {
//!     let config = Config::default();
//!     let ocr_client = Arc::new(HttpOcrClient::new(
//!         config.ocr_service_url.clone(),
//!         config.ocr_service_token.clone(),
//!         config.ocr_timeout,
//!     ));
//!     let deps = Arc::new(Deps {
//!         blob: InMemoryBlobStore::new(config.blob_bucket.clone()),
//!         documents: InMemoryDocumentRepository::new(),
//!         borrowers: InMemoryBorrowerRepository::new(),
//!         queue: None,
//!         extraction_router: Arc::new(ExtractionRouter::new()),
//!         ocr_router: Arc::new(OcrRouter::new(
//!             ocr_client,
//!             config.breaker_failure_threshold,
//!             config.breaker_cooldown,
//!             Arc::new(HeuristicScannedDetector),
//!         )),
//!         llm: Arc::new(NoopLlm),
//!         config,
//!     });
//!     let service = DocumentService::new(deps);
//!
//!     let document = service
//!         .upload("loan.pdf", std::fs::read("loan.pdf")?, None, ExtractionMethod::Auto, OcrMode::Auto)
//!         .await?;
//!     println!("document {} is {:?}", document.id, document.status);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod blob;
pub mod config;
pub mod error;
pub mod extraction;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod parser;
pub mod pipeline;
pub mod queue;
pub mod repository;
pub mod retry;
pub mod service;
pub mod task;

#[cfg(feature = "http")]
pub mod api;

pub use crate::error::{Error, Result};
pub use crate::models::{
    AccountNumber, AccountType, Address, Borrower, BorrowerRecord, ComplexityAssessment, ComplexityLevel,
    ConsistencyWarning, ConsistencyWarningKind, Document, DocumentStatus, ExtractionMethod, ExtractionResult,
    IncomePeriod, IncomeRecord, IncomeSourceType, Money, OcrMode, SourceReference,
};
pub use crate::service::{Deps, DocumentService};
