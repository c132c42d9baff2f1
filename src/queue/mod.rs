//! Task-queue contract for asynchronous document processing.
//!
//! The queue itself is an external collaborator; this module defines the
//! payload shape and an in-process implementation (`tokio::sync`-backed)
//! suitable for embedding the pipeline in a single process and for driving
//! end-to-end tests without a real broker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ExtractionMethod, OcrMode};

/// Body of a document-processing task, matching the wire contract a real
/// queue message carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDocumentTask {
    pub document_id: Uuid,
    pub filename: String,
    pub method: ExtractionMethod,
    pub ocr: OcrMode,
}

/// A task as delivered to a consumer, carrying the redelivery count a real
/// queue would report via an `X-Retry-Count`-equivalent header.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub task: ProcessDocumentTask,
    pub retry_count: u32,
}

/// Enqueues and delivers [`ProcessDocumentTask`]s.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: ProcessDocumentTask) -> Result<()>;
    /// Pops the next delivery, if any is pending.
    async fn poll(&self) -> Result<Option<Delivery>>;
    /// Re-delivers a task with an incremented retry count, as a broker would
    /// on a negative-acknowledge or visibility-timeout expiry.
    async fn redeliver(&self, task: ProcessDocumentTask, retry_count: u32) -> Result<()>;
}

/// FIFO in-memory task queue. One consumer at a time is assumed, matching
/// the worker loop's single-task-in-flight processing model.
pub struct InMemoryTaskQueue {
    pending: Mutex<std::collections::VecDeque<Delivery>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            pending: Mutex::new(std::collections::VecDeque::new()),
        })
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self {
            pending: Mutex::new(std::collections::VecDeque::new()),
        }
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: ProcessDocumentTask) -> Result<()> {
        self.pending.lock().await.push_back(Delivery { task, retry_count: 0 });
        Ok(())
    }

    async fn poll(&self) -> Result<Option<Delivery>> {
        Ok(self.pending.lock().await.pop_front())
    }

    async fn redeliver(&self, task: ProcessDocumentTask, retry_count: u32) -> Result<()> {
        self.pending
            .lock()
            .await
            .push_back(Delivery { task, retry_count });
        Ok(())
    }
}
