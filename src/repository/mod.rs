//! Persistence seams for documents and borrowers.
//!
//! Relational persistence is out of scope here; these traits define the
//! contract a real database-backed implementation would satisfy, with
//! `DashMap`-backed in-memory implementations for embedding and for tests —
//! the same pattern `core::knowledge_base::KnowledgeBase` uses to hold its
//! entries in `DashMap<Uuid, T>` behind an `Arc`.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Borrower, Document, DocumentStatus};

/// Stores [`Document`] records and enforces content-hash uniqueness.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert(&self, document: Document) -> Result<Document>;
    async fn get(&self, id: Uuid) -> Result<Document>;
    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Document>>;
    async fn update_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<Document>;
    async fn update_extraction(
        &self,
        id: Uuid,
        page_count: Option<u32>,
        ocr_processed: Option<bool>,
    ) -> Result<Document>;
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Document>>;
}

/// Stores [`Borrower`] records, persisting a borrower together with its
/// income history, account numbers, and source references as one unit.
#[async_trait]
pub trait BorrowerRepository: Send + Sync {
    /// Persists a borrower and all of its child records atomically: either
    /// the whole record is visible to subsequent reads, or none of it is.
    async fn insert(&self, borrower: Borrower) -> Result<Borrower>;
    async fn get(&self, id: Uuid) -> Result<Borrower>;
    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Borrower>>;
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Borrower>>;
    async fn search_by_name(&self, query: &str) -> Result<Vec<Borrower>>;
    /// Removes a borrower and all of its child records.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// In-memory [`DocumentRepository`], suitable for tests and for embedding the
/// pipeline in a process with no external database.
pub struct InMemoryDocumentRepository {
    by_id: DashMap<Uuid, Document>,
    by_hash: DashMap<String, Uuid>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            by_id: DashMap::new(),
            by_hash: DashMap::new(),
        })
    }
}

impl Default for InMemoryDocumentRepository {
    fn default() -> Self {
        Self {
            by_id: DashMap::new(),
            by_hash: DashMap::new(),
        }
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn insert(&self, document: Document) -> Result<Document> {
        if self.by_hash.contains_key(&document.content_hash) {
            return Err(Error::duplicate(document.content_hash.clone()));
        }
        self.by_hash.insert(document.content_hash.clone(), document.id);
        self.by_id.insert(document.id, document.clone());
        Ok(document)
    }

    async fn get(&self, id: Uuid) -> Result<Document> {
        self.by_id
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or_else(|| Error::not_found(format!("document {id}")))
    }

    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        Ok(self
            .by_hash
            .get(content_hash)
            .and_then(|id| self.by_id.get(&id).map(|entry| entry.clone())))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error_message: Option<String>,
    ) -> Result<Document> {
        let mut entry = self
            .by_id
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("document {id}")))?;
        entry.status = status;
        if error_message.is_some() {
            entry.error_message = error_message;
        }
        Ok(entry.clone())
    }

    async fn update_extraction(
        &self,
        id: Uuid,
        page_count: Option<u32>,
        ocr_processed: Option<bool>,
    ) -> Result<Document> {
        let mut entry = self
            .by_id
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("document {id}")))?;
        if page_count.is_some() {
            entry.page_count = page_count;
        }
        if ocr_processed.is_some() {
            entry.ocr_processed = ocr_processed;
        }
        Ok(entry.clone())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Document>> {
        let mut all: Vec<Document> = self.by_id.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|d| d.created_at);
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }
}

/// In-memory [`BorrowerRepository`].
pub struct InMemoryBorrowerRepository {
    by_id: DashMap<Uuid, Borrower>,
    by_document: DashMap<Uuid, Vec<Uuid>>,
}

impl InMemoryBorrowerRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            by_id: DashMap::new(),
            by_document: DashMap::new(),
        })
    }
}

impl Default for InMemoryBorrowerRepository {
    fn default() -> Self {
        Self {
            by_id: DashMap::new(),
            by_document: DashMap::new(),
        }
    }
}

#[async_trait]
impl BorrowerRepository for InMemoryBorrowerRepository {
    async fn insert(&self, borrower: Borrower) -> Result<Borrower> {
        self.by_document
            .entry(borrower.document_id)
            .or_default()
            .push(borrower.id);
        self.by_id.insert(borrower.id, borrower.clone());
        Ok(borrower)
    }

    async fn get(&self, id: Uuid) -> Result<Borrower> {
        self.by_id
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or_else(|| Error::not_found(format!("borrower {id}")))
    }

    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Borrower>> {
        let ids = self
            .by_document
            .get(&document_id)
            .map(|v| v.clone())
            .unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.by_id.get(&id).map(|e| e.clone()))
            .collect())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Borrower>> {
        let mut all: Vec<Borrower> = self.by_id.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|b| b.created_at);
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn search_by_name(&self, query: &str) -> Result<Vec<Borrower>> {
        let needle = query.to_lowercase();
        Ok(self
            .by_id
            .iter()
            .filter(|e| e.value().full_name.to_lowercase().contains(&needle))
            .map(|e| e.value().clone())
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        if let Some((_, borrower)) = self.by_id.remove(&id) {
            if let Some(mut ids) = self.by_document.get_mut(&borrower.document_id) {
                ids.retain(|existing| *existing != id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractionMethod;

    fn sample_document(hash: &str) -> Document {
        Document::new("file.pdf", hash, 100, "application/pdf", "mem://b/k", ExtractionMethod::Auto)
    }

    #[tokio::test]
    async fn rejects_duplicate_content_hash() {
        let repo = InMemoryDocumentRepository::new();
        repo.insert(sample_document("hash1")).await.unwrap();
        let err = repo.insert(sample_document("hash1")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateDocument(_)));
    }

    #[tokio::test]
    async fn find_by_hash_returns_none_when_absent() {
        let repo = InMemoryDocumentRepository::new();
        assert!(repo.find_by_hash("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_transitions_are_visible_on_read() {
        let repo = InMemoryDocumentRepository::new();
        let doc = repo.insert(sample_document("hash2")).await.unwrap();
        repo.update_status(doc.id, DocumentStatus::Processing, None)
            .await
            .unwrap();
        let fetched = repo.get(doc.id).await.unwrap();
        assert_eq!(fetched.status, DocumentStatus::Processing);
    }

    #[tokio::test]
    async fn borrower_list_for_document_reflects_insert_and_delete() {
        let repo = InMemoryBorrowerRepository::new();
        let doc_id = Uuid::new_v4();
        let borrower = Borrower {
            id: Uuid::new_v4(),
            document_id: doc_id,
            full_name: "Jane Doe".to_string(),
            ssn_hash: None,
            address: None,
            confidence_score: 0.8,
            income_history: vec![],
            account_numbers: vec![],
            sources: vec![],
            needs_review: false,
            created_at: chrono::Utc::now(),
        };
        let id = borrower.id;
        repo.insert(borrower).await.unwrap();
        assert_eq!(repo.list_for_document(doc_id).await.unwrap().len(), 1);
        repo.delete(id).await.unwrap();
        assert_eq!(repo.list_for_document(doc_id).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn search_by_name_is_case_insensitive_substring() {
        let repo = InMemoryBorrowerRepository::new();
        let borrower = Borrower {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            full_name: "Alice Smith".to_string(),
            ssn_hash: None,
            address: None,
            confidence_score: 0.5,
            income_history: vec![],
            account_numbers: vec![],
            sources: vec![],
            needs_review: true,
            created_at: chrono::Utc::now(),
        };
        repo.insert(borrower).await.unwrap();
        assert_eq!(repo.search_by_name("smith").await.unwrap().len(), 1);
        assert_eq!(repo.search_by_name("bob").await.unwrap().len(), 0);
    }
}
