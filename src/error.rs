//! Error taxonomy for the QA agent core.
//!
//! Each stage of the pipeline has its own error type so callers can decide
//! how far a failure propagates:
//!
//! | Error | Raised by | Policy |
//! |-------|-----------|--------|
//! | [`ExtractError`] | [`extract`](crate::extract) | file is skipped, batch continues |
//! | [`EmbeddingError`] | [`embedding`](crate::embedding) | aborts the ingestion or query |
//! | [`StoreError`] | [`store`](crate::store) | aborts the operation |
//! | [`ModelError`] | [`llm`](crate::llm) | returned as a tagged failure |
//!
//! [`QaError`] unifies the last three at the operation boundary and exposes
//! a stable [`ErrorKind`] tag, so the service layer can tell a genuine
//! failure apart from a generated answer without inspecting text.

use serde::Serialize;
use thiserror::Error;

/// Text extraction failure for a single uploaded file.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file extension: {0:?}")]
    UnsupportedExtension(String),
    #[error("file is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("HTML extraction failed: {0}")]
    Html(String),
}

/// Embedding backend failure (credentials, availability, malformed output).
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider is disabled")]
    Disabled,
    #[error("embedding configuration error: {0}")]
    Config(String),
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),
    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("embedding API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
    #[error("local embedding model failed: {0}")]
    Local(String),
}

/// Knowledge base persistence failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(
        "knowledge base was built with {built} but is being read with {current}; rebuild it"
    )]
    BackendMismatch { built: String, current: String },
    #[error("invalid store input: {0}")]
    InvalidInput(String),
    #[error("store is corrupt: {0}")]
    Corrupt(String),
}

/// Language model invocation failure.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("language model configuration error: {0}")]
    Config(String),
    #[error("missing credential: no API key supplied and {0} is not set")]
    MissingCredential(String),
    #[error("language model request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("language model API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("language model returned no text: {0}")]
    EmptyResponse(String),
}

/// Stable, machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Embedding,
    Store,
    Model,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Embedding => "embedding_error",
            ErrorKind::Store => "store_error",
            ErrorKind::Model => "model_error",
        }
    }
}

/// Error surfaced at the ingest/query/script operation boundary.
#[derive(Debug, Error)]
pub enum QaError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl QaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QaError::Embedding(_) => ErrorKind::Embedding,
            QaError::Store(_) => ErrorKind::Store,
            QaError::Model(_) => ErrorKind::Model,
        }
    }
}
