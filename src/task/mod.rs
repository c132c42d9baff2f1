//! Task handler: the glue between a [`TaskQueue`] delivery and
//! [`DocumentService::process`], owning the retry-budget decision the
//! service itself cannot make (it has no visibility into delivery count).

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::queue::{Delivery, TaskQueue};
use crate::service::DocumentService;

/// What the caller (HTTP handler or worker loop) should do with a delivery
/// after [`handle_delivery`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Processing succeeded, or failed terminally and the Document was
    /// marked FAILED. The queue should acknowledge (remove) the message.
    Acknowledge,
    /// A transient failure occurred and the retry budget is not yet
    /// exhausted. The queue should redeliver.
    Retry,
}

/// Runs one delivery through the pipeline and decides Acknowledge vs Retry.
///
/// A transient failure below `max_retry_count` redelivers without touching
/// the Document's status (it is left in PROCESSING). At the retry budget,
/// the Document is marked FAILED and the delivery is acknowledged — the
/// queue must not redeliver forever.
pub async fn handle_delivery(service: &DocumentService, delivery: &Delivery) -> TaskOutcome {
    let task = &delivery.task;
    let result = service
        .process(task.document_id, task.filename.clone(), task.method, task.ocr)
        .await;

    match result {
        Ok(()) => {
            info!(document_id = %task.document_id, "document processed successfully");
            TaskOutcome::Acknowledge
        }
        Err(err) if err.is_transient() => {
            let max_retry_count = service.deps().config.max_retry_count;
            if delivery.retry_count >= max_retry_count {
                warn!(
                    document_id = %task.document_id,
                    retry_count = delivery.retry_count,
                    error = %err,
                    "retry budget exhausted, marking document failed"
                );
                mark_failed(service, task.document_id, format!("exhausted retries: {err}")).await;
            } else {
                info!(
                    document_id = %task.document_id,
                    retry_count = delivery.retry_count,
                    error = %err,
                    "transient failure, will redeliver"
                );
            }
            if delivery.retry_count >= max_retry_count {
                TaskOutcome::Acknowledge
            } else {
                TaskOutcome::Retry
            }
        }
        Err(err) => {
            error!(document_id = %task.document_id, error = %err, "non-transient failure processing document");
            mark_failed(service, task.document_id, err.to_string()).await;
            TaskOutcome::Acknowledge
        }
    }
}

async fn mark_failed(service: &DocumentService, document_id: uuid::Uuid, message: String) {
    let deps = service.deps();
    if let Err(err) = deps
        .documents
        .update_status(document_id, crate::models::DocumentStatus::Failed, Some(message))
        .await
    {
        error!(document_id = %document_id, error = %err, "failed to record terminal failure status");
    }
}

/// Drives the in-process worker loop: polls the queue, dispatches each
/// delivery to [`handle_delivery`], and redelivers with an incremented
/// retry count when instructed.
///
/// Intended for the synchronous `loanpipe-worker` binary; a real deployment
/// behind SQS/Pub/Sub would plug the same [`handle_delivery`] function into
/// a platform-specific consumer loop instead of this one.
pub async fn run_worker(service: Arc<DocumentService>, queue: Arc<dyn TaskQueue>, idle_sleep: Duration) {
    loop {
        match queue.poll().await {
            Ok(Some(delivery)) => {
                let outcome = handle_delivery(&service, &delivery).await;
                if outcome == TaskOutcome::Retry {
                    let next_retry_count = delivery.retry_count + 1;
                    if let Err(err) = queue.redeliver(delivery.task, next_retry_count).await {
                        error!(error = %err, "failed to redeliver task");
                    }
                }
            }
            Ok(None) => tokio::time::sleep(idle_sleep).await,
            Err(err) => {
                error!(error = %err, "failed to poll task queue");
                tokio::time::sleep(idle_sleep).await;
            }
        }
    }
}
