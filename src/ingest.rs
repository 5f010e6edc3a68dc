//! Ingestion pipeline orchestration.
//!
//! One batch of uploaded files flows through extraction → chunking →
//! embedding → knowledge base rebuild. A file that cannot be extracted is
//! logged and skipped; the rest of the batch continues. Every batch that
//! yields documents replaces the knowledge base wholesale, so after two
//! ingests only the second batch is searchable.

use crate::chunk::chunk_documents;
use crate::config::{Config, EmptyBatchPolicy};
use crate::embedding::{embed_texts, EmbeddingProvider};
use crate::error::QaError;
use crate::extract::{extract_documents, FileKind};
use crate::models::{Document, IngestReport, SkippedFile, UploadedFile};
use crate::store::KnowledgeBase;

pub const NO_DOCUMENTS_MESSAGE: &str = "No documents processed.";

pub async fn ingest_files(
    kb: &KnowledgeBase,
    provider: &dyn EmbeddingProvider,
    config: &Config,
    files: &[UploadedFile],
) -> Result<IngestReport, QaError> {
    let mut documents: Vec<Document> = Vec::new();
    let mut skipped = Vec::new();
    let mut raw_html: Option<String> = None;

    for file in files {
        // The last HTML file of the batch is the page scripts are written against.
        if matches!(FileKind::from_name(&file.name), Ok(FileKind::Html)) {
            if let Ok(text) = std::str::from_utf8(&file.bytes) {
                raw_html = Some(text.to_string());
            }
        }

        match extract_documents(&file.name, &file.bytes) {
            Ok(docs) => {
                tracing::debug!(file = %file.name, documents = docs.len(), "extracted");
                documents.extend(docs);
            }
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "skipping file");
                skipped.push(SkippedFile {
                    name: file.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if documents.is_empty() {
        if config.ingest.empty_batch_policy == EmptyBatchPolicy::Clear {
            kb.clear().await?;
        }
        tracing::info!(
            files = files.len(),
            skipped = skipped.len(),
            policy = ?config.ingest.empty_batch_policy,
            "no documents in batch"
        );
        return Ok(IngestReport {
            status_message: NO_DOCUMENTS_MESSAGE.to_string(),
            documents_processed: 0,
            chunks_written: 0,
            skipped,
            raw_html: None,
            rebuilt: false,
        });
    }

    let chunks = chunk_documents(
        &documents,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    );
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embed_texts(provider, &texts, config.embedding.batch_size).await?;

    kb.rebuild(&chunks, &vectors, &provider.identity()).await?;

    tracing::info!(
        files = files.len(),
        documents = documents.len(),
        chunks = chunks.len(),
        skipped = skipped.len(),
        "ingest complete"
    );

    Ok(IngestReport {
        status_message: format!("Success! Processed {} documents.", documents.len()),
        documents_processed: documents.len(),
        chunks_written: chunks.len(),
        skipped,
        raw_html,
        rebuilt: true,
    })
}
