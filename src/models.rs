//! Core data models used throughout LocalMind.
//!
//! These types represent the documents, chunks, and answers that flow
//! through the ingestion and question-answering pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A document file discovered in the data directory, before extraction.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Stable identifier: the path relative to the data directory.
    pub doc_id: String,
    /// Absolute or config-relative path used to read the file.
    pub path: PathBuf,
}

/// One indexed unit of text, as persisted in the vector store.
///
/// `(doc_id, chunk_index)` is the record's key.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub doc_id: String,
    /// Zero-based position of this chunk within its document.
    pub chunk_index: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A chunk returned by a nearest-neighbor query, with its distance to the
/// query vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub doc_id: String,
    pub chunk_index: i64,
    pub content: String,
    /// Euclidean (L2) distance to the query vector.
    pub distance: f32,
}

impl RetrievedChunk {
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            doc_id: self.doc_id.clone(),
            chunk_index: self.chunk_index,
        }
    }
}

/// Reference to a chunk that grounded an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub doc_id: String,
    pub chunk_index: i64,
}

/// The result of answering one question.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Chunks used as context, in retrieval order. Empty when nothing
    /// relevant was found.
    pub sources: Vec<SourceRef>,
}
