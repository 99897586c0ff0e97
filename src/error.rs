//! Error types for the retrieval and answering pipeline.
//!
//! Library code returns [`RagError`]; the CLI wraps it in `anyhow` with
//! context, and the HTTP server maps each kind to a status code
//! (see [`server`](crate::server)).
//!
//! "No relevant chunks" is deliberately **not** an error: the answer
//! service handles it with a fixed fallback answer.

use thiserror::Error;

/// Errors that can occur while ingesting, retrieving, or answering.
#[derive(Debug, Error)]
pub enum RagError {
    /// The input contained no extractable text.
    #[error("no extractable text in {0}")]
    EmptyInput(String),

    /// A document could not be read or converted to text.
    #[error("failed to extract {doc_id}: {message}")]
    Extraction { doc_id: String, message: String },

    /// The embedding model failed or is unavailable.
    #[error("embedding error ({provider}): {message}")]
    Embedding {
        /// The provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store could not be reached or a query failed.
    #[error("vector store unavailable ({backend}): {message}")]
    StoreUnavailable {
        /// The store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector of the wrong dimension was offered to the store.
    #[error("embedding dimension mismatch: store expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The LLM backend returned a non-success status or an unreadable stream.
    #[error("LLM backend error {status}: {body}")]
    Backend { status: u16, body: String },

    /// An operation exceeded its configured time limit.
    #[error("{0} timed out")]
    Timeout(String),

    /// The caller supplied an invalid request (empty question, bad top_k).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The chunker was configured with an unusable window.
    #[error(transparent)]
    Chunking(#[from] crate::chunk::ChunkError),

    /// A configuration value is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Shorthand for an [`RagError::Embedding`] error.
    pub fn embedding(provider: impl Into<String>, message: impl ToString) -> Self {
        RagError::Embedding {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Shorthand for a [`RagError::StoreUnavailable`] error.
    pub fn store(backend: impl Into<String>, message: impl ToString) -> Self {
        RagError::StoreUnavailable {
            backend: backend.into(),
            message: message.to_string(),
        }
    }
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
