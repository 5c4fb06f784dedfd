//! HTTP API for uploading documents and chatting over them.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/upload-document` | Multipart upload, field `file` |
//! | `GET`    | `/documents` | List documents and the corpus token total |
//! | `GET`    | `/documents/{id}` | One document with a content preview |
//! | `DELETE` | `/documents/{id}` | Remove one document |
//! | `DELETE` | `/documents` | Remove every document |
//! | `POST`   | `/chat` | Answer a message, optionally with history |
//! | `GET`    | `/status` | Mode, totals, index state, context metrics |
//!
//! Request and response bodies use camelCase keys.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid input: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `gateway_error` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! served from another origin can call the API.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use adaptive_rag_core::models::{ChatMessage, Document};
use adaptive_rag_core::CoreError;

use crate::config::Config;
use crate::orchestrator::{ChatOutcome, RetrievalOrchestrator, StatusReport};

/// Number of characters shown by `GET /documents/{id}`.
const PREVIEW_CHARS: usize = 2000;

/// Upload size cap for `POST /upload-document`.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared state handed to every handler.
type AppState = Arc<RetrievalOrchestrator>;

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated. Returns an error if the
/// orchestrator cannot be built from `config` or the address cannot be bound.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let orchestrator = Arc::new(RetrievalOrchestrator::from_config(config)?);
    let app = build_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(
        bind = %config.server.bind,
        threshold = config.corpus.token_threshold,
        "adaptive-rag listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Routes with CORS and the upload size limit applied.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/upload-document", post(handle_upload))
        .route("/documents", get(handle_list).delete(handle_clear))
        .route("/documents/{id}", get(handle_get).delete(handle_delete))
        .route("/chat", post(handle_chat))
        .route("/status", get(handle_status))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        let status = match &e {
            CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Gateway(_) | CoreError::Contract(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &e {
            CoreError::Gateway(detail) => format!("upstream model call failed: {}", detail),
            other => other.to_string(),
        };
        if !e.is_client_error() {
            error!(code = e.code(), %message, "request failed");
        }
        AppError {
            status,
            code: e.code().to_string(),
            message,
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /upload-document ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    id: String,
    name: String,
    token_count: usize,
    total_tokens: usize,
    upload_time: DateTime<Utc>,
    mode_switched_to_rag: bool,
}

/// Reads the `file` field, extracts its text, and adds it to the corpus.
///
/// Extraction runs on the blocking pool; PDF parsing is CPU-bound.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| bad_request("No file provided"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;
        upload = Some((filename, bytes));
        break;
    }
    let (filename, bytes) = upload.ok_or_else(|| bad_request("No file provided"))?;

    let orchestrator = Arc::clone(&state);
    let outcome = tokio::task::spawn_blocking(move || orchestrator.upload(&filename, &bytes))
        .await
        .map_err(|e| internal(format!("upload task failed: {}", e)))??;

    Ok(Json(UploadResponse {
        id: outcome.document.id,
        name: outcome.document.name,
        token_count: outcome.document.token_count,
        total_tokens: outcome.total_tokens,
        upload_time: outcome.document.upload_time,
        mode_switched_to_rag: outcome.mode_switched,
    }))
}

// ============ GET /documents ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentSummary {
    id: String,
    name: String,
    token_count: usize,
    upload_time: DateTime<Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(d: &Document) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            token_count: d.token_count,
            upload_time: d.upload_time,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentListResponse {
    documents: Vec<DocumentSummary>,
    total_tokens: usize,
}

async fn handle_list(State(state): State<AppState>) -> Json<DocumentListResponse> {
    let corpus = state.corpus();
    Json(DocumentListResponse {
        documents: corpus.documents().iter().map(DocumentSummary::from).collect(),
        total_tokens: corpus.total_tokens(),
    })
}

// ============ GET /documents/{id} ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentDetail {
    #[serde(flatten)]
    summary: DocumentSummary,
    content_preview: String,
    full_content_length: usize,
}

/// First [`PREVIEW_CHARS`] characters, with `...` appended when cut.
fn content_preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetail>, AppError> {
    let doc = state.get(&id)?;
    Ok(Json(DocumentDetail {
        summary: DocumentSummary::from(&doc),
        content_preview: content_preview(&doc.content),
        full_content_length: doc.content.chars().count(),
    }))
}

// ============ DELETE /documents, /documents/{id} ============

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.remove(&id).await?;
    Ok(Json(MessageResponse {
        message: "Document deleted successfully".to_string(),
    }))
}

async fn handle_clear(State(state): State<AppState>) -> Json<MessageResponse> {
    state.clear().await;
    Json(MessageResponse {
        message: "All documents cleared successfully".to_string(),
    })
}

// ============ POST /chat ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    message: String,
    #[serde(default)]
    conversation_history: Vec<ChatMessage>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatOutcome>, AppError> {
    let outcome = state.chat(&req.message, &req.conversation_history).await?;
    Ok(Json(outcome))
}

// ============ GET /status ============

async fn handle_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.status().await)
}
