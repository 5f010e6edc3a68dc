//! HTTP API for the QA agent.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Health check (returns version) |
//! | `POST` | `/upload-docs` | Multipart `files` upload; rebuilds the knowledge base |
//! | `POST` | `/generate-test-cases` | `{query, api_key?}` → Markdown test-case table |
//! | `POST` | `/generate-script` | `{test_case, html_code, api_key?}` → Selenium script |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "model_error", "message": "language model API error 429: ..." } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request` | 400 |
//! | `embedding_error` | 502 |
//! | `model_error` | 502 |
//! | `store_error` | 500 |
//! | `internal` | 500 |
//!
//! A query against a missing knowledge base is not an error: it returns
//! `200` with `"status": "not_found"`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can call the API directly.

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::agent::QaAgent;
use crate::config::Config;
use crate::error::{ErrorKind, QaError};
use crate::models::{Answer, SkippedFile, UploadedFile};

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Starts the HTTP server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let agent = Arc::new(QaAgent::from_config(config.clone())?);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "QA agent listening");
    axum::serve(listener, router(agent)).await?;

    Ok(())
}

/// Build the application router around a shared agent.
pub fn router(agent: Arc<QaAgent>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_health))
        .route("/upload-docs", post(handle_upload))
        .route("/generate-test-cases", post(handle_test_cases))
        .route("/generate-script", post(handle_script))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(agent)
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

struct AppError {
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<QaError> for AppError {
    fn from(err: QaError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::Embedding | ErrorKind::Model => StatusCode::BAD_GATEWAY,
            ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(code = kind.as_str(), error = %err, "request failed");
        AppError {
            status,
            code: kind.as_str().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError {
            status: err.status(),
            code: if err.status().is_client_error() {
                "bad_request".to_string()
            } else {
                "internal".to_string()
            },
            message: err.body_text(),
        }
    }
}

// ============ GET / ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running",
        message: "QA Agent Backend is Active",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /upload-docs ============

#[derive(Serialize)]
struct UploadResponse {
    status: &'static str,
    message: String,
    html_content: Option<String>,
    documents_processed: usize,
    skipped: Vec<SkippedFile>,
}

async fn handle_upload(
    State(agent): State<Arc<QaAgent>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        files.push(UploadedFile::new(name, bytes.to_vec()));
    }

    tracing::info!(files = files.len(), "upload received");
    let report = agent.ingest(&files).await?;

    Ok(Json(UploadResponse {
        status: "success",
        message: report.status_message,
        html_content: report.raw_html,
        documents_processed: report.documents_processed,
        skipped: report.skipped,
    }))
}

// ============ POST /generate-test-cases ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    status: &'static str,
    response: String,
}

async fn handle_test_cases(
    State(agent): State<Arc<QaAgent>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(req) = payload?;
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let answer = agent
        .answer_query(&req.query, req.api_key.as_deref())
        .await?;
    let status = match answer {
        Answer::Generated(_) => "success",
        Answer::KnowledgeBaseMissing => "not_found",
    };

    Ok(Json(QueryResponse {
        status,
        response: answer.text().to_string(),
    }))
}

// ============ POST /generate-script ============

#[derive(Deserialize)]
struct ScriptRequest {
    test_case: String,
    html_code: String,
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ScriptResponse {
    status: &'static str,
    script: String,
}

async fn handle_script(
    State(agent): State<Arc<QaAgent>>,
    payload: Result<Json<ScriptRequest>, JsonRejection>,
) -> Result<Json<ScriptResponse>, AppError> {
    let Json(req) = payload?;
    if req.test_case.trim().is_empty() {
        return Err(bad_request("test_case must not be empty"));
    }

    let script = agent
        .synthesize_script(&req.test_case, &req.html_code, req.api_key.as_deref())
        .await?;

    Ok(Json(ScriptResponse {
        status: "success",
        script,
    }))
}
