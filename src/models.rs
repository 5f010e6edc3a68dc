//! Core data models used throughout the QA agent.
//!
//! These types represent the files, documents, chunks and search hits that
//! flow through the ingestion and retrieval pipeline.

use serde::Serialize;
use serde_json::{Map, Value};

/// A file handed to ingestion: original name plus raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Extracted text of one file (or one page of it). Never persisted.
#[derive(Debug, Clone)]
pub struct Document {
    /// Originating filename.
    pub source: String,
    pub text: String,
    /// Format-specific markers (`format`, `page`, `title`, ...).
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A bounded slice of a document's text; the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub source: String,
    /// Position of this chunk within its document.
    pub chunk_index: i64,
    /// Character offset of the chunk's first character in the document text.
    pub char_offset: i64,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    pub metadata: Map<String, Value>,
}

/// A chunk returned from similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Cosine similarity to the query, in `[-1.0, 1.0]`.
    pub score: f32,
}

/// A file dropped by ingestion, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub status_message: String,
    pub documents_processed: usize,
    pub chunks_written: usize,
    pub skipped: Vec<SkippedFile>,
    /// Raw text of the uploaded HTML file, kept for script synthesis.
    pub raw_html: Option<String>,
    /// Whether a new knowledge base was built by this batch.
    pub rebuilt: bool,
}

/// Result of a test-case query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Raw model output.
    Generated(String),
    /// No knowledge base has been built yet; the model was not called.
    KnowledgeBaseMissing,
}

impl Answer {
    pub const MISSING_MESSAGE: &'static str = "Knowledge Base not found. Please build it first.";

    /// Text suitable for display to the end user.
    pub fn text(&self) -> &str {
        match self {
            Answer::Generated(text) => text,
            Answer::KnowledgeBaseMissing => Self::MISSING_MESSAGE,
        }
    }
}
