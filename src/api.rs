//! HTTP surface for docsift.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /upload` – Multipart upload (`file` field) of one PDF or image; the document is
//!   extracted, chunked, embedded, and indexed. Returns `{ message, document_id, filename,
//!   total_chunks }`.
//! - `POST /upload-batch` – Multipart upload of several `files`; each file succeeds or fails on
//!   its own and the response lists one entry per file in upload order.
//! - `POST /query` – `{ "query": "...", "top_k": 5 }` returns the most similar chunks.
//! - `POST /themes` – `{ "query": "...", "cluster_count": 3 }` clusters related chunks and
//!   returns one generated summary per cluster with its supporting documents.
//! - `GET /documents` – Records of every indexed document.
//! - `GET /metrics` – Ingestion counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Errors are returned as `{ "error": message }` with 400 for unsupported files and blank
//! queries, 422 when no text could be extracted, and 500 otherwise.

use crate::index::SearchResult;
use crate::processing::{BatchEntry, IngestError, ProcessingApi, QueryError, ThemeError, Upload};
use crate::storage::{DocumentRecord, StorageError};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the HTTP router exposing the document API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: ProcessingApi + 'static,
{
    Router::new()
        .route("/upload", post(upload_document::<S>))
        .route("/upload-batch", post(upload_batch::<S>))
        .route("/query", post(query_documents::<S>))
        .route("/themes", post(identify_themes::<S>))
        .route("/documents", get(list_documents::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Success response for `POST /upload`.
#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    document_id: String,
    filename: String,
    total_chunks: usize,
}

/// Ingest a single uploaded document.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: ProcessingApi,
{
    let upload = read_uploads(multipart, "file")
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::bad_request("Missing multipart field 'file'"))?;

    let outcome = service.ingest(upload).await?;
    tracing::info!(
        document_id = %outcome.document_id,
        filename = %outcome.filename,
        chunks = outcome.chunk_count,
        "Upload request completed"
    );
    Ok(Json(UploadResponse {
        message: "File processed and embeddings stored",
        document_id: outcome.document_id,
        filename: outcome.filename,
        total_chunks: outcome.chunk_count,
    }))
}

/// One entry of the `POST /upload-batch` response.
#[derive(Serialize)]
#[serde(untagged)]
enum BatchItem {
    Indexed {
        filename: String,
        document_id: String,
        total_chunks: usize,
    },
    Failed {
        filename: String,
        error: String,
    },
}

impl From<BatchEntry> for BatchItem {
    fn from(entry: BatchEntry) -> Self {
        match entry {
            BatchEntry::Indexed(outcome) => Self::Indexed {
                filename: outcome.filename,
                document_id: outcome.document_id,
                total_chunks: outcome.chunk_count,
            },
            BatchEntry::Failed { filename, error } => Self::Failed { filename, error },
        }
    }
}

/// Response body for `POST /upload-batch`.
#[derive(Serialize)]
struct BatchResponse {
    uploaded_documents: Vec<BatchItem>,
}

/// Ingest every uploaded file, isolating failures per file.
async fn upload_batch<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<BatchResponse>, AppError>
where
    S: ProcessingApi,
{
    let uploads = read_uploads(multipart, "files").await?;
    if uploads.is_empty() {
        return Err(AppError::bad_request("Missing multipart field 'files'"));
    }

    let entries = service.ingest_batch(uploads).await;
    Ok(Json(BatchResponse {
        uploaded_documents: entries.into_iter().map(BatchItem::from).collect(),
    }))
}

/// Collect every multipart field named `field_name` into an [`Upload`].
async fn read_uploads(mut multipart: Multipart, field_name: &str) -> Result<Vec<Upload>, AppError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        uploads.push(Upload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Ok(uploads)
}

/// Request body for `POST /query`.
#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

/// Response body for `POST /query`.
#[derive(Serialize)]
struct QueryResponse {
    results: Vec<SearchResult>,
}

/// Return the chunks most similar to the query text.
async fn query_documents<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError>
where
    S: ProcessingApi,
{
    let results = service.query(&request.query, request.top_k).await?;
    Ok(Json(QueryResponse { results }))
}

/// Request body for `POST /themes`.
#[derive(Deserialize)]
struct ThemesRequest {
    query: String,
    #[serde(default)]
    cluster_count: Option<usize>,
}

#[derive(Serialize)]
struct ThemeItem {
    theme: String,
    supporting_documents: Vec<String>,
}

/// Response body for `POST /themes`.
#[derive(Serialize)]
struct ThemesResponse {
    themes: Vec<ThemeItem>,
}

/// Cluster chunks related to the query and summarize each cluster.
async fn identify_themes<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ThemesRequest>,
) -> Result<Json<ThemesResponse>, AppError>
where
    S: ProcessingApi,
{
    let themes = service
        .themes(&request.query, request.cluster_count)
        .await?
        .into_iter()
        .map(|theme| ThemeItem {
            theme: theme.summary,
            supporting_documents: theme.document_ids,
        })
        .collect();
    Ok(Json(ThemesResponse { themes }))
}

/// Response body for `GET /documents`.
#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentRecord>,
}

/// List every indexed document.
async fn list_documents<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<DocumentsResponse>, AppError>
where
    S: ProcessingApi,
{
    let documents = service.list_documents().await?;
    Ok(Json(DocumentsResponse { documents }))
}

/// Return ingestion counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> impl IntoResponse
where
    S: ProcessingApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/upload",
                description: "Upload one PDF or image as multipart field 'file'; its text is extracted, chunked, embedded, and indexed.",
                request_example: None,
            },
            CommandDescriptor {
                name: "upload_batch",
                method: "POST",
                path: "/upload-batch",
                description: "Upload several documents as multipart fields 'files'; failures are reported per file.",
                request_example: None,
            },
            CommandDescriptor {
                name: "query",
                method: "POST",
                path: "/query",
                description: "Return the stored chunks most similar to the query text.",
                request_example: Some(json!({ "query": "artificial intelligence", "top_k": 5 })),
            },
            CommandDescriptor {
                name: "themes",
                method: "POST",
                path: "/themes",
                description: "Cluster chunks related to the query and summarize each cluster into a theme.",
                request_example: Some(json!({ "query": "artificial intelligence", "cluster_count": 3 })),
            },
            CommandDescriptor {
                name: "documents",
                method: "GET",
                path: "/documents",
                description: "List every indexed document with its chunk count.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

/// Error returned by handlers, rendered as `{ "error": message }`.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(error: IngestError) -> Self {
        let status = match error {
            IngestError::UnsupportedType(_) => StatusCode::BAD_REQUEST,
            IngestError::NoTextExtracted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<QueryError> for AppError {
    fn from(error: QueryError) -> Self {
        match error {
            QueryError::EmptyQuery => Self::bad_request(error.to_string()),
            other => Self::internal(other),
        }
    }
}

impl From<ThemeError> for AppError {
    fn from(error: ThemeError) -> Self {
        match error {
            ThemeError::Query(inner) => inner.into(),
            other => Self::internal(other),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(error: StorageError) -> Self {
        Self::internal(error)
    }
}

impl From<MultipartError> for AppError {
    fn from(error: MultipartError) -> Self {
        Self::new(error.status(), error.body_text())
    }
}
