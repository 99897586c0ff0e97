//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the only way the pipeline touches persisted
//! chunks, so backends are interchangeable:
//!
//! | Backend | Module | Selected by |
//! |---------|--------|-------------|
//! | In-memory | [`memory`] | tests, embedding into other programs |
//! | SQLite | [`sqlite`] | `db.url = "sqlite:..."` (default) |
//! | PostgreSQL + pgvector | `pgvector` | `db.url = "postgres://..."`, feature `pgvector` |
//!
//! # Contract
//!
//! - Records are keyed by `(doc_id, chunk_index)`. [`insert_batch`](VectorStore::insert_batch)
//!   replaces every stored chunk of the documents it contains, so
//!   re-ingesting a document leaves exactly its current chunks.
//! - Each `insert_batch` call commits atomically or not at all.
//! - A store holds vectors of exactly one dimension. The first batch (or
//!   [`register_model`](VectorStore::register_model)) fixes it; anything
//!   else is rejected with [`RagError::DimensionMismatch`].
//! - [`nearest`](VectorStore::nearest) orders by ascending Euclidean
//!   distance, breaking ties by `(doc_id, chunk_index)`.

pub mod memory;
#[cfg(feature = "pgvector")]
pub mod pgvector;
pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::l2_distance;
use crate::error::{RagError, Result};
use crate::models::{DocumentChunk, RetrievedChunk};

/// Summary of what a store currently holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreInfo {
    pub backend: String,
    /// Embedding model the store was built with, when known.
    pub model: Option<String>,
    /// Vector dimension, once fixed by the first write.
    pub dims: Option<usize>,
    pub chunks: u64,
    pub documents: u64,
}

/// Storage backend for chunk records with nearest-neighbor search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in logs and errors (`"sqlite"`, `"memory"`, ...).
    fn backend(&self) -> &str;

    /// Bind the store to an embedding model.
    ///
    /// On an unbound store this records `model` and `dims`. On a bound store
    /// it fails if either differs, since vectors from different models are
    /// not comparable.
    async fn register_model(&self, model: &str, dims: usize) -> Result<()>;

    /// Upsert a batch of records in one transaction.
    async fn insert_batch(&self, records: &[DocumentChunk]) -> Result<()>;

    /// The `k` records closest to `vector`, nearest first.
    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>>;

    /// Counts and binding information.
    async fn info(&self) -> Result<StoreInfo>;

    /// Remove every record and forget the bound model.
    async fn clear(&self) -> Result<()>;

    /// Release connections. The store must not be used afterwards.
    async fn close(&self) {}
}

/// Open the store named by `config.db.url` and run its migrations.
pub async fn open(config: &Config) -> Result<Arc<dyn VectorStore>> {
    let url = config.db.url.as_str();

    if url.starts_with("sqlite:") {
        let store = sqlite::SqliteStore::connect(url).await?;
        return Ok(Arc::new(store));
    }

    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        #[cfg(feature = "pgvector")]
        {
            let store = pgvector::PgVectorStore::connect(url).await?;
            return Ok(Arc::new(store));
        }
        #[cfg(not(feature = "pgvector"))]
        return Err(RagError::Config(
            "PostgreSQL support requires building with --features pgvector".into(),
        ));
    }

    Err(RagError::Config(format!("Unsupported db.url: {}", url)))
}

/// Run one operation on `store`, then close it whether or not it succeeded.
pub async fn with_store<T, F, Fut>(store: Arc<dyn VectorStore>, op: F) -> Result<T>
where
    F: FnOnce(Arc<dyn VectorStore>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let result = op(store.clone()).await;
    store.close().await;
    result
}

/// Validate a batch before writing it.
///
/// Returns the batch's common dimension (or `None` for an empty batch) after
/// checking that every vector agrees with it and with `store_dims`, and that
/// no record has blank content.
pub(crate) fn validate_batch(
    records: &[DocumentChunk],
    store_dims: Option<usize>,
) -> Result<Option<usize>> {
    let Some(first) = records.first() else {
        return Ok(None);
    };
    let dims = store_dims.unwrap_or(first.embedding.len());
    if dims == 0 {
        return Err(RagError::InvalidRequest(
            "embedding vectors must not be empty".into(),
        ));
    }

    for record in records {
        if record.embedding.len() != dims {
            return Err(RagError::DimensionMismatch {
                expected: dims,
                actual: record.embedding.len(),
            });
        }
        if record.content.trim().is_empty() {
            return Err(RagError::InvalidRequest(format!(
                "chunk {} of {} has no content",
                record.chunk_index, record.doc_id
            )));
        }
        if record.chunk_index < 0 {
            return Err(RagError::InvalidRequest(format!(
                "chunk index {} of {} is negative",
                record.chunk_index, record.doc_id
            )));
        }
    }

    Ok(Some(dims))
}

/// Documents a batch replaces. Every stored chunk of these documents is
/// dropped before the batch is written.
pub(crate) fn batch_doc_ids(records: &[DocumentChunk]) -> BTreeSet<&str> {
    records.iter().map(|r| r.doc_id.as_str()).collect()
}

/// Reject a query vector that cannot be compared with the stored ones.
pub(crate) fn check_query_dims(store_dims: Option<usize>, vector: &[f32]) -> Result<()> {
    match store_dims {
        Some(dims) if dims != vector.len() => Err(RagError::DimensionMismatch {
            expected: dims,
            actual: vector.len(),
        }),
        _ => Ok(()),
    }
}

/// Brute-force ranking shared by backends without a native distance operator.
///
/// Candidates are `(doc_id, chunk_index, content, embedding)`.
pub(crate) fn rank_by_distance<I>(query: &[f32], candidates: I, k: usize) -> Vec<RetrievedChunk>
where
    I: IntoIterator<Item = (String, i64, String, Vec<f32>)>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<RetrievedChunk> = candidates
        .into_iter()
        .map(|(doc_id, chunk_index, content, embedding)| RetrievedChunk {
            distance: l2_distance(query, &embedding),
            doc_id,
            chunk_index,
            content,
        })
        .collect();

    scored.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    scored.truncate(k);
    scored
}
