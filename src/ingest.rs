//! Ingestion pipeline orchestration.
//!
//! Coordinates the offline flow: scanner → extraction → chunking →
//! embedding → vector store. Each document is its own commit boundary:
//! a failure is logged and counted, documents already written stay
//! written, and the remaining documents are still processed.

use anyhow::{bail, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

use crate::chunk::{chunk_text, expected_chunk_count};
use crate::config::{ChunkingConfig, Config};
use crate::connector_fs;
use crate::context::AppContext;
use crate::embedding::Embedder;
use crate::error::RagError;
use crate::extract;
use crate::models::{DocumentChunk, SourceDocument};
use crate::store::VectorStore;

/// Counters for one ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub documents_seen: u64,
    pub documents_ingested: u64,
    /// Documents with no extractable text.
    pub documents_skipped: u64,
    pub documents_failed: u64,
    pub chunks_written: u64,
}

/// Chunks, embeds and stores documents.
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkingConfig,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            chunking,
        }
    }

    /// Index already-extracted text under `doc_id`.
    ///
    /// All chunks of the document go to the store in one batch. Returns the
    /// number of records written, or [`RagError::EmptyInput`] when the text
    /// produces no chunks.
    pub async fn ingest_text(&self, doc_id: &str, text: &str) -> Result<usize, RagError> {
        let windows = chunk_text(text, self.chunking.max_chars, self.chunking.overlap)?;

        // Keep each window's position even if a whitespace-only one is dropped
        let indexed: Vec<(i64, String)> = windows
            .into_iter()
            .enumerate()
            .filter(|(_, w)| !w.trim().is_empty())
            .map(|(i, w)| (i as i64, w))
            .collect();
        if indexed.is_empty() {
            return Err(RagError::EmptyInput(doc_id.to_string()));
        }

        let texts: Vec<String> = indexed.iter().map(|(_, w)| w.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(RagError::embedding(
                self.embedder.model_name(),
                format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            ));
        }

        let records: Vec<DocumentChunk> = indexed
            .into_iter()
            .zip(vectors)
            .map(|((chunk_index, content), embedding)| DocumentChunk {
                doc_id: doc_id.to_string(),
                chunk_index,
                content,
                embedding,
            })
            .collect();

        self.store.insert_batch(&records).await?;
        Ok(records.len())
    }

    /// Extract and index one file.
    pub async fn ingest_document(&self, doc: &SourceDocument) -> Result<usize, RagError> {
        let text = read_document(doc).await?;
        self.ingest_text(&doc.doc_id, &text).await
    }

    /// Ingest every document, continuing past per-document failures.
    pub async fn ingest(&self, docs: &[SourceDocument]) -> IngestReport {
        let mut report = IngestReport::default();

        for doc in docs {
            report.documents_seen += 1;
            let span = tracing::info_span!("ingest_document", doc_id = %doc.doc_id);

            match self.ingest_document(doc).instrument(span).await {
                Ok(written) => {
                    tracing::info!(doc_id = %doc.doc_id, chunks = written, "indexed document");
                    report.documents_ingested += 1;
                    report.chunks_written += written as u64;
                }
                Err(RagError::EmptyInput(_)) => {
                    tracing::warn!(doc_id = %doc.doc_id, "no text extracted, skipping");
                    report.documents_skipped += 1;
                }
                Err(e) => {
                    tracing::error!(doc_id = %doc.doc_id, error = %e, "failed to ingest document");
                    report.documents_failed += 1;
                }
            }
        }

        report
    }
}

/// Extract a document's text off the async workers.
async fn read_document(doc: &SourceDocument) -> Result<String, RagError> {
    let path = doc.path.clone();
    let doc_id = doc.doc_id.clone();

    let extraction_error = |message: String| RagError::Extraction {
        doc_id: doc_id.clone(),
        message,
    };

    tokio::task::spawn_blocking(move || extract::extract_file(&path))
        .await
        .map_err(|e| extraction_error(e.to_string()))?
        .map_err(|e| extraction_error(e.to_string()))
}

/// `localmind ingest`: scan the data directory and index every document.
///
/// Fails (non-zero exit) when any document could not be ingested.
pub async fn run_ingest(ctx: &AppContext) -> Result<IngestReport> {
    let config = &ctx.config;
    let docs = connector_fs::scan_documents(&config.ingest)?;
    tracing::info!(
        data_dir = %config.ingest.data_dir.display(),
        documents = docs.len(),
        "starting ingestion"
    );

    let ingestor = Ingestor::new(
        ctx.embedder.clone(),
        ctx.store.clone(),
        config.chunking.clone(),
    );
    let report = ingestor.ingest(&docs).await;

    println!("ingest {}", config.ingest.data_dir.display());
    println!("  documents seen: {}", report.documents_seen);
    println!("  documents ingested: {}", report.documents_ingested);
    println!("  documents skipped (empty): {}", report.documents_skipped);
    println!("  documents failed: {}", report.documents_failed);
    println!("  chunks written: {}", report.chunks_written);

    if report.documents_failed > 0 {
        bail!(
            "{} of {} documents failed to ingest",
            report.documents_failed,
            report.documents_seen
        );
    }
    println!("ok");
    Ok(report)
}

/// `localmind ingest --dry-run`: report what would be indexed.
///
/// Extracts text to estimate chunk counts but never loads the embedding
/// model or touches the store.
pub async fn run_dry_run(config: &Config) -> Result<()> {
    let docs = connector_fs::scan_documents(&config.ingest)?;

    let mut estimated = 0usize;
    let mut unreadable = 0usize;
    for doc in &docs {
        match read_document(doc).await {
            Ok(text) => {
                let chunks = expected_chunk_count(
                    text.chars().count(),
                    config.chunking.max_chars,
                    config.chunking.overlap,
                );
                tracing::debug!(doc_id = %doc.doc_id, chunks, "dry-run estimate");
                estimated += chunks;
            }
            Err(e) => {
                tracing::warn!(doc_id = %doc.doc_id, error = %e, "unreadable document");
                unreadable += 1;
            }
        }
    }

    println!("ingest {} (dry-run)", config.ingest.data_dir.display());
    println!("  documents found: {}", docs.len());
    println!("  unreadable: {}", unreadable);
    println!("  estimated chunks: {}", estimated);
    Ok(())
}
