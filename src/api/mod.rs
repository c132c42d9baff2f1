//! HTTP API: a thin adapter over [`DocumentService`] and the task handler.
//!
//! Grounded on the `mcp::server` module's axum `Router`/`State` shape (same
//! `CorsLayer::permissive()` + `TraceLayer::new_for_http()` layering), swapped
//! from JSON-RPC-over-stdio/HTTP onto a conventional REST surface.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{Document, ExtractionMethod, OcrMode};
use crate::queue::{Delivery, ProcessDocumentTask};
use crate::service::DocumentService;
use crate::task;

/// Builds the full router, with CORS and request tracing layered over every
/// route.
pub fn router(service: Arc<DocumentService>) -> Router {
    Router::new()
        .route("/api/documents/", post(upload_document).get(list_documents))
        .route("/api/documents/{id}", get(get_document))
        .route("/api/documents/{id}/status", get(get_document_status))
        .route("/api/borrowers/", get(list_borrowers))
        .route("/api/borrowers/search", get(search_borrowers))
        .route("/api/borrowers/{id}", get(get_borrower))
        .route("/api/borrowers/{id}/sources", get(get_borrower_sources))
        .route("/api/tasks/process-document", post(process_document_task))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::DuplicateDocument(_) => StatusCode::CONFLICT,
            Error::ValidationFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    ocr: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    id: Uuid,
    filename: String,
    file_hash: String,
    file_size_bytes: u64,
    status: crate::models::DocumentStatus,
    page_count: Option<u32>,
    error_message: Option<String>,
    message: String,
}

impl From<Document> for UploadResponse {
    fn from(document: Document) -> Self {
        let message = match document.status {
            crate::models::DocumentStatus::Pending => "document queued for processing".to_string(),
            crate::models::DocumentStatus::Processing => "document is processing".to_string(),
            crate::models::DocumentStatus::Completed => "document processed".to_string(),
            crate::models::DocumentStatus::Failed => document.error_message.clone().unwrap_or_else(|| "processing failed".to_string()),
        };
        Self {
            id: document.id,
            filename: document.filename,
            file_hash: document.content_hash,
            file_size_bytes: document.file_size_bytes,
            status: document.status,
            page_count: document.page_count,
            error_message: document.error_message,
            message,
        }
    }
}

async fn upload_document(
    State(service): State<Arc<DocumentService>>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Response, Error> {
    let method = match query.method.as_deref() {
        Some(raw) => ExtractionMethod::parse(raw).ok_or_else(|| Error::validation(format!("invalid method: {raw}")))?,
        None => ExtractionMethod::Auto,
    };
    let ocr_mode = match query.ocr.as_deref() {
        Some(raw) => OcrMode::parse(raw).ok_or_else(|| Error::validation(format!("invalid ocr mode: {raw}")))?,
        None => OcrMode::Auto,
    };

    let mut filename = None;
    let mut content_type = None;
    let mut bytes = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| Error::validation(err.to_string()))? {
        if field.name() == Some("file") {
            filename = field.file_name().map(str::to_string);
            content_type = field.content_type().map(str::to_string);
            bytes = Some(field.bytes().await.map_err(|err| Error::validation(err.to_string()))?.to_vec());
        }
    }

    let filename = filename.ok_or_else(|| Error::validation("multipart field 'file' is required".to_string()))?;
    let bytes = bytes.ok_or_else(|| Error::validation("multipart field 'file' had no content".to_string()))?;

    let document = service.upload(filename, bytes, content_type, method, ocr_mode).await?;
    Ok((StatusCode::CREATED, Json(UploadResponse::from(document))).into_response())
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    50
}

async fn list_documents(State(service): State<Arc<DocumentService>>, Query(query): Query<PageQuery>) -> Result<Json<Vec<Document>>, Error> {
    let documents = service.deps().documents.list(query.limit, query.offset).await?;
    Ok(Json(documents))
}

async fn get_document(State(service): State<Arc<DocumentService>>, Path(id): Path<Uuid>) -> Result<Json<Document>, Error> {
    Ok(Json(service.deps().documents.get(id).await?))
}

#[derive(Debug, Serialize)]
struct DocumentStatusResponse {
    id: Uuid,
    status: crate::models::DocumentStatus,
    page_count: Option<u32>,
    error_message: Option<String>,
}

async fn get_document_status(State(service): State<Arc<DocumentService>>, Path(id): Path<Uuid>) -> Result<Json<DocumentStatusResponse>, Error> {
    let document = service.deps().documents.get(id).await?;
    Ok(Json(DocumentStatusResponse {
        id: document.id,
        status: document.status,
        page_count: document.page_count,
        error_message: document.error_message,
    }))
}

async fn list_borrowers(
    State(service): State<Arc<DocumentService>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<crate::models::Borrower>>, Error> {
    Ok(Json(service.deps().borrowers.list(query.limit, query.offset).await?))
}

async fn get_borrower(State(service): State<Arc<DocumentService>>, Path(id): Path<Uuid>) -> Result<Json<crate::models::Borrower>, Error> {
    Ok(Json(service.deps().borrowers.get(id).await?))
}

async fn get_borrower_sources(
    State(service): State<Arc<DocumentService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<crate::models::SourceReference>>, Error> {
    let borrower = service.deps().borrowers.get(id).await?;
    Ok(Json(borrower.sources))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    account_number: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

async fn search_borrowers(
    State(service): State<Arc<DocumentService>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<crate::models::Borrower>>, Error> {
    let mut results = match &query.name {
        Some(name) if !name.is_empty() => service.deps().borrowers.search_by_name(name).await?,
        _ => service.deps().borrowers.list(usize::MAX, 0).await?,
    };

    if let Some(account_number) = &query.account_number {
        results.retain(|b| b.account_numbers.iter().any(|a| &a.number == account_number));
    }

    let page = results.into_iter().skip(query.offset).take(query.limit).collect();
    Ok(Json(page))
}

async fn process_document_task(
    State(service): State<Arc<DocumentService>>,
    headers: HeaderMap,
    Json(task): Json<ProcessDocumentTask>,
) -> StatusCode {
    let retry_count = headers
        .get("X-Retry-Count")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0);

    let delivery = Delivery { task, retry_count };
    match task::handle_delivery(&service, &delivery).await {
        task::TaskOutcome::Acknowledge => StatusCode::OK,
        task::TaskOutcome::Retry => StatusCode::SERVICE_UNAVAILABLE,
    }
}
