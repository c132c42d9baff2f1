//! Document Service: the top-level pipeline orchestrator.
//!
//! Wires every collaborator through an explicit [`Deps`] struct — built once
//! at process startup and shared by `Arc` clone into the HTTP layer and the
//! worker loop, the same way `KnowledgeBase::with_config` builds its own
//! `Arc<StorageBackend>`/`Arc<EmbeddingEngine>` once rather than reaching
//! for module-level mutable state.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::blob::{content_hash, BlobStore};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extraction::router::ExtractionRouter;
use crate::extraction::ExtractionContext;
use crate::llm::LlmClient;
use crate::models::{Address, Borrower, BorrowerRecord, Document, DocumentStatus, ExtractionMethod, OcrMode};
use crate::ocr::{OcrMethod, OcrRouter};
use crate::pipeline::chunker::ChunkConfig;
use crate::queue::{ProcessDocumentTask, TaskQueue};
use crate::repository::{BorrowerRepository, DocumentRepository};

/// Maximum number of names surfaced in a partial-success `error_message`.
const MAX_PARTIAL_FAILURE_NAMES: usize = 5;

/// Every collaborator the orchestrator needs, built once and shared by
/// `Arc` clone. No global singletons: the HTTP layer and the worker loop
/// each hold their own `Arc<Deps>` (or, typically, the same one).
pub struct Deps {
    pub blob: Arc<dyn BlobStore>,
    pub documents: Arc<dyn DocumentRepository>,
    pub borrowers: Arc<dyn BorrowerRepository>,
    pub queue: Option<Arc<dyn TaskQueue>>,
    pub extraction_router: Arc<ExtractionRouter>,
    pub ocr_router: Arc<OcrRouter>,
    pub llm: Arc<dyn LlmClient>,
    pub config: Config,
}

/// Top-level pipeline orchestrator: `upload` accepts bytes and creates a
/// Document; `process` is the worker-invoked handler that runs OCR,
/// extraction, and persistence.
pub struct DocumentService {
    deps: Arc<Deps>,
}

impl DocumentService {
    pub fn new(deps: Arc<Deps>) -> Self {
        Self { deps }
    }

    pub fn deps(&self) -> &Arc<Deps> {
        &self.deps
    }

    /// Accepts upload bytes, hash-deduplicates, stores them, and either
    /// enqueues a processing task or (synchronous/local mode) runs the
    /// pipeline inline before returning.
    #[instrument(skip(self, bytes), fields(filename = %filename))]
    pub async fn upload(
        &self,
        filename: impl Into<String>,
        bytes: Vec<u8>,
        content_type: Option<String>,
        method: ExtractionMethod,
        ocr_mode: OcrMode,
    ) -> Result<Document> {
        let filename = filename.into();
        let hash = content_hash(&bytes);

        if self.deps.documents.find_by_hash(&hash).await?.is_some() {
            return Err(Error::duplicate(format!("a document with hash {hash} already exists")));
        }

        let file_type = content_type.unwrap_or_else(|| sniff_mime(&bytes));
        let mut document = Document::new(filename.clone(), hash, bytes.len() as u64, file_type, String::new(), method);
        let blob_key = document.id.to_string();

        match self.deps.blob.put(&blob_key, bytes).await {
            Ok(uri) => document.blob_uri = uri,
            Err(err) => {
                document.status = DocumentStatus::Failed;
                document.error_message = Some(format!("storage upload failed: {err}"));
                return self.deps.documents.insert(document).await;
            }
        }

        let document = self.deps.documents.insert(document).await?;

        match &self.deps.queue {
            Some(queue) => {
                let task = ProcessDocumentTask {
                    document_id: document.id,
                    filename: document.filename.clone(),
                    method,
                    ocr: ocr_mode,
                };
                match queue.enqueue(task).await {
                    Ok(()) => Ok(document),
                    Err(err) => {
                        self.deps
                            .documents
                            .update_status(document.id, DocumentStatus::Failed, Some(format!("failed to queue: {err}")))
                            .await
                    }
                }
            }
            None => {
                self.process(document.id, document.filename.clone(), method, ocr_mode).await?;
                self.deps.documents.get(document.id).await
            }
        }
    }

    /// The worker-invoked handler. Idempotent: a Document already in a
    /// terminal status is a no-op. A transient failure is propagated to the
    /// caller (the task handler) rather than marked here — only the caller
    /// knows the queue's retry budget.
    #[instrument(skip(self), fields(document_id = %document_id))]
    pub async fn process(
        &self,
        document_id: Uuid,
        filename: String,
        method: ExtractionMethod,
        ocr_mode: OcrMode,
    ) -> Result<()> {
        let document = self.deps.documents.get(document_id).await?;
        if document.status.is_terminal() {
            info!("document already in terminal status, skipping reprocessing");
            return Ok(());
        }

        self.deps
            .documents
            .update_status(document_id, DocumentStatus::Processing, None)
            .await?;

        let bytes = match self.deps.blob.get(&document.blob_uri).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.fail_terminal(document_id, format!("storage fetch failed: {err}")).await?;
                return Ok(());
            }
        };

        let ocr_output = match self.deps.ocr_router.route(&bytes, &filename, ocr_mode).await {
            Ok(output) => output,
            Err(err) => {
                self.fail_terminal(document_id, format!("OCR failed: {err}")).await?;
                return Ok(());
            }
        };

        self.deps
            .documents
            .update_extraction(document_id, ocr_output.page_count, Some(ocr_output.ocr_method != OcrMethod::None))
            .await?;

        let ctx = ExtractionContext {
            document_id,
            filename: filename.clone(),
            raw_text: ocr_output.text,
            markdown_text: None,
            page_count: ocr_output.page_count,
            llm: self.deps.llm.clone(),
            chunk_config: ChunkConfig::new(self.deps.config.chunk_max_chars, self.deps.config.chunk_overlap_chars),
        };

        let extraction = match self.deps.extraction_router.route(method, &ctx).await {
            Ok(result) => result,
            Err(err) if err.is_transient() => {
                warn!(error = %err, "extraction failed transiently, leaving document in PROCESSING for retry");
                return Err(err);
            }
            Err(err) => {
                self.fail_terminal(document_id, format!("extraction failed: {err}")).await?;
                return Ok(());
            }
        };

        let mut persisted = 0usize;
        let mut failed_names: Vec<String> = Vec::new();

        for record in extraction.borrowers {
            let name = record.full_name.clone();
            let borrower = to_persistent_borrower(document_id, record);
            match self.deps.borrowers.insert(borrower).await {
                Ok(_) => persisted += 1,
                Err(err) => {
                    warn!(error = %err, borrower = %name, "failed to persist borrower");
                    failed_names.push(name);
                }
            }
        }

        if !failed_names.is_empty() {
            let total = persisted + failed_names.len();
            let shown: Vec<&str> = failed_names.iter().take(MAX_PARTIAL_FAILURE_NAMES).map(String::as_str).collect();
            let message = format!("partial success: {persisted}/{total} persisted; failures: {}", shown.join(", "));
            self.deps
                .documents
                .update_status(document_id, DocumentStatus::Completed, Some(message))
                .await?;
        } else {
            self.deps
                .documents
                .update_status(document_id, DocumentStatus::Completed, None)
                .await?;
        }

        Ok(())
    }

    async fn fail_terminal(&self, document_id: Uuid, message: String) -> Result<()> {
        self.deps
            .documents
            .update_status(document_id, DocumentStatus::Failed, Some(message))
            .await?;
        Ok(())
    }
}

/// Hashes a raw SSN with SHA-256 before it is ever persisted or logged. The
/// only place in the pipeline allowed to see a raw SSN past this point is
/// this function's caller.
fn hash_ssn(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn to_persistent_borrower(document_id: Uuid, record: BorrowerRecord) -> Borrower {
    let sources = record
        .sources
        .into_iter()
        .map(|mut source| {
            source.document_id = document_id;
            source
        })
        .collect();

    let mut borrower = Borrower {
        id: Uuid::new_v4(),
        document_id,
        full_name: record.full_name,
        ssn_hash: record.raw_ssn.as_deref().map(hash_ssn),
        address: record.address.map(Address),
        confidence_score: record.confidence_score,
        income_history: record.income_history,
        account_numbers: record.account_numbers,
        sources,
        needs_review: record.needs_review,
        created_at: chrono::Utc::now(),
    };
    borrower.clamp_confidence();
    borrower
}

fn sniff_mime(bytes: &[u8]) -> String {
    infer::get(bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::InMemoryBlobStore;
    use crate::config::Config;
    use crate::error::Result as PipeResult;
    use crate::llm::{LlmExtraction, ModelTier};
    use crate::ocr::{HeuristicScannedDetector, OcrClient, OcrOutput};
    use crate::queue::InMemoryTaskQueue;
    use crate::repository::{InMemoryBorrowerRepository, InMemoryDocumentRepository};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    struct FixtureLlm;

    #[async_trait]
    impl LlmClient for FixtureLlm {
        async fn extract(&self, _system: &str, _prompt: &str, _schema: &Value, _tier: ModelTier) -> PipeResult<LlmExtraction> {
            Ok(LlmExtraction {
                parsed: json!({
                    "borrowers": [{
                        "full_name": "John Smith",
                        "income_history": [
                            {"amount_cents": 7_500_000, "period": "annual", "year": 2024, "source_type": "employment", "employer": null},
                            {"amount_cents": 7_200_000, "period": "annual", "year": 2023, "source_type": "employment", "employer": null}
                        ],
                        "sources": [{"snippet": "John Smith applied for a loan.", "section": null}]
                    }]
                }),
                tokens: 100,
                finish_reason: "stop".to_string(),
            })
        }
    }

    struct NeverOcrDetector;
    impl crate::ocr::ScannedDocumentDetector for NeverOcrDetector {
        fn is_scanned(&self, _bytes: &[u8], _filename: &str) -> bool {
            false
        }
    }

    struct UnreachableOcrClient;
    #[async_trait]
    impl OcrClient for UnreachableOcrClient {
        async fn ocr(&self, _bytes: &[u8], _filename: &str) -> PipeResult<OcrOutput> {
            panic!("OCR client should not be called for a native-text document in auto mode");
        }
    }

    fn native_text_bytes() -> Vec<u8> {
        b"John Smith applied for a loan in 2024.".to_vec()
    }

    fn test_deps(llm: Arc<dyn LlmClient>, queue: Option<Arc<dyn TaskQueue>>) -> Arc<Deps> {
        let ocr_router = OcrRouter::new(
            Arc::new(UnreachableOcrClient),
            3,
            Duration::from_secs(30),
            Arc::new(NeverOcrDetector),
        );
        Arc::new(Deps {
            blob: InMemoryBlobStore::new("test-bucket"),
            documents: InMemoryDocumentRepository::new(),
            borrowers: InMemoryBorrowerRepository::new(),
            queue,
            extraction_router: Arc::new(ExtractionRouter::new()),
            ocr_router: Arc::new(ocr_router),
            llm,
            config: Config::default(),
        })
    }

    #[tokio::test]
    async fn happy_path_docling_uploads_synchronously_and_completes() {
        let deps = test_deps(Arc::new(FixtureLlm), None);
        let service = DocumentService::new(deps.clone());

        let document = service
            .upload("loan.pdf", native_text_bytes(), None, ExtractionMethod::Docling, OcrMode::Auto)
            .await
            .unwrap();

        assert_eq!(document.status, DocumentStatus::Completed);
        assert_eq!(document.ocr_processed, Some(false));

        let borrowers = deps.borrowers.list_for_document(document.id).await.unwrap();
        assert_eq!(borrowers.len(), 1);
        assert_eq!(borrowers[0].full_name, "John Smith");
        assert_eq!(borrowers[0].income_history.len(), 2);
        assert!(borrowers[0].sources[0].char_start.is_none());
    }

    #[tokio::test]
    async fn happy_path_langextract_populates_char_offsets() {
        struct SpanLlm;
        #[async_trait]
        impl LlmClient for SpanLlm {
            async fn extract(&self, _s: &str, _p: &str, _schema: &Value, _tier: ModelTier) -> PipeResult<LlmExtraction> {
                Ok(LlmExtraction {
                    parsed: json!({
                        "borrowers": [{
                            "full_name": "John Smith",
                            "sources": [{"snippet": "John Smith", "section": null, "extraction_text": "John Smith"}]
                        }]
                    }),
                    tokens: 80,
                    finish_reason: "stop".to_string(),
                })
            }
        }

        let deps = test_deps(Arc::new(SpanLlm), None);
        let service = DocumentService::new(deps.clone());

        let document = service
            .upload("loan.pdf", native_text_bytes(), None, ExtractionMethod::Langextract, OcrMode::Auto)
            .await
            .unwrap();

        assert_eq!(document.status, DocumentStatus::Completed);
        let borrowers = deps.borrowers.list_for_document(document.id).await.unwrap();
        let source = &borrowers[0].sources[0];
        let start = source.char_start.unwrap();
        let end = source.char_end.unwrap();
        let raw = native_text_bytes();
        let raw_text = String::from_utf8(raw).unwrap();
        assert_eq!(&raw_text[start..end], "John Smith");
    }

    #[tokio::test]
    async fn duplicate_upload_is_rejected_and_blob_store_holds_one_object() {
        let deps = test_deps(Arc::new(FixtureLlm), None);
        let service = DocumentService::new(deps.clone());

        let bytes = native_text_bytes();
        let first = service
            .upload("loan.pdf", bytes.clone(), None, ExtractionMethod::Docling, OcrMode::Auto)
            .await
            .unwrap();
        assert_eq!(first.status, DocumentStatus::Completed);

        let second = service
            .upload("loan-copy.pdf", bytes, None, ExtractionMethod::Docling, OcrMode::Auto)
            .await;
        assert!(matches!(second, Err(Error::DuplicateDocument(_))));

        assert_eq!(deps.documents.list(100, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn async_mode_enqueues_and_leaves_document_pending() {
        let queue = InMemoryTaskQueue::new();
        let deps = test_deps(Arc::new(FixtureLlm), Some(queue.clone() as Arc<dyn TaskQueue>));
        let service = DocumentService::new(deps.clone());

        let document = service
            .upload("loan.pdf", native_text_bytes(), None, ExtractionMethod::Docling, OcrMode::Auto)
            .await
            .unwrap();

        assert_eq!(document.status, DocumentStatus::Pending);
        let delivery = queue.poll().await.unwrap().unwrap();
        assert_eq!(delivery.task.document_id, document.id);
        assert_eq!(delivery.retry_count, 0);
    }

    #[tokio::test]
    async fn partial_persistence_failure_still_completes_with_summary() {
        struct TwoNameLlm;
        #[async_trait]
        impl LlmClient for TwoNameLlm {
            async fn extract(&self, _s: &str, _p: &str, _schema: &Value, _tier: ModelTier) -> PipeResult<LlmExtraction> {
                Ok(LlmExtraction {
                    parsed: json!({
                        "borrowers": [
                            {"full_name": "Alice Anderson", "sources": [{"snippet": "Alice Anderson", "section": null}]},
                            {"full_name": "Bob Brown", "sources": [{"snippet": "Bob Brown", "section": null}]}
                        ]
                    }),
                    tokens: 50,
                    finish_reason: "stop".to_string(),
                })
            }
        }

        struct OneShotFailingBorrowerRepository {
            inner: Arc<InMemoryBorrowerRepository>,
            fail_next: std::sync::atomic::AtomicBool,
        }

        #[async_trait]
        impl BorrowerRepository for OneShotFailingBorrowerRepository {
            async fn insert(&self, borrower: Borrower) -> PipeResult<Borrower> {
                if self.fail_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
                    return Err(Error::persistence("simulated constraint violation"));
                }
                self.inner.insert(borrower).await
            }
            async fn get(&self, id: Uuid) -> PipeResult<Borrower> {
                self.inner.get(id).await
            }
            async fn list_for_document(&self, document_id: Uuid) -> PipeResult<Vec<Borrower>> {
                self.inner.list_for_document(document_id).await
            }
            async fn list(&self, limit: usize, offset: usize) -> PipeResult<Vec<Borrower>> {
                self.inner.list(limit, offset).await
            }
            async fn search_by_name(&self, query: &str) -> PipeResult<Vec<Borrower>> {
                self.inner.search_by_name(query).await
            }
            async fn delete(&self, id: Uuid) -> PipeResult<()> {
                self.inner.delete(id).await
            }
        }

        let borrowers: Arc<dyn BorrowerRepository> = Arc::new(OneShotFailingBorrowerRepository {
            inner: InMemoryBorrowerRepository::new(),
            fail_next: std::sync::atomic::AtomicBool::new(true),
        });

        let ocr_router = OcrRouter::new(Arc::new(UnreachableOcrClient), 3, Duration::from_secs(30), Arc::new(NeverOcrDetector));
        let deps = Arc::new(Deps {
            blob: InMemoryBlobStore::new("test-bucket"),
            documents: InMemoryDocumentRepository::new(),
            borrowers,
            queue: None,
            extraction_router: Arc::new(ExtractionRouter::new()),
            ocr_router: Arc::new(ocr_router),
            llm: Arc::new(TwoNameLlm),
            config: Config::default(),
        });
        let service = DocumentService::new(deps.clone());

        let document = service
            .upload("loan.pdf", native_text_bytes(), None, ExtractionMethod::Docling, OcrMode::Auto)
            .await
            .unwrap();

        assert_eq!(document.status, DocumentStatus::Completed);
        let message = document.error_message.unwrap();
        assert!(message.starts_with("partial success: 1/2 persisted"));
    }
}
