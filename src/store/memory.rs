//! In-memory vector store.
//!
//! Keeps records in a `BTreeMap` keyed by `(doc_id, chunk_index)` and ranks
//! by brute force. Nothing is persisted; used by tests and by programs that
//! embed the pipeline without a database.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{
    batch_doc_ids, check_query_dims, rank_by_distance, validate_batch, StoreInfo, VectorStore,
};
use crate::error::{RagError, Result};
use crate::models::{DocumentChunk, RetrievedChunk};

#[derive(Default)]
struct Inner {
    rows: BTreeMap<(String, i64), (String, Vec<f32>)>,
    model: Option<String>,
    dims: Option<usize>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| RagError::store("memory", "lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| RagError::store("memory", "lock poisoned"))
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn register_model(&self, model: &str, dims: usize) -> Result<()> {
        let mut inner = self.write()?;
        if let Some(existing) = inner.dims {
            if existing != dims {
                return Err(RagError::DimensionMismatch {
                    expected: existing,
                    actual: dims,
                });
            }
        }
        match &inner.model {
            Some(existing) if existing != model => Err(RagError::Config(format!(
                "store was built with model '{}', not '{}'; clear it to switch models",
                existing, model
            ))),
            _ => {
                inner.model = Some(model.to_string());
                inner.dims = Some(dims);
                Ok(())
            }
        }
    }

    async fn insert_batch(&self, records: &[DocumentChunk]) -> Result<()> {
        let mut inner = self.write()?;
        let Some(dims) = validate_batch(records, inner.dims)? else {
            return Ok(());
        };

        let replaced = batch_doc_ids(records);
        inner.rows.retain(|(d, _), _| !replaced.contains(d.as_str()));
        for r in records {
            inner.rows.insert(
                (r.doc_id.clone(), r.chunk_index),
                (r.content.clone(), r.embedding.clone()),
            );
        }
        inner.dims = Some(dims);
        Ok(())
    }

    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let inner = self.read()?;
        check_query_dims(inner.dims, vector)?;

        let candidates = inner.rows.iter().map(|((doc_id, idx), (content, emb))| {
            (doc_id.clone(), *idx, content.clone(), emb.clone())
        });
        Ok(rank_by_distance(vector, candidates, k))
    }

    async fn info(&self) -> Result<StoreInfo> {
        let inner = self.read()?;
        let mut documents: Vec<&str> = inner.rows.keys().map(|(d, _)| d.as_str()).collect();
        documents.dedup();

        Ok(StoreInfo {
            backend: "memory".to_string(),
            model: inner.model.clone(),
            dims: inner.dims,
            chunks: inner.rows.len() as u64,
            documents: documents.len() as u64,
        })
    }

    async fn clear(&self) -> Result<()> {
        *self.write()? = Inner::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(doc: &str, idx: i64, v: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            doc_id: doc.to_string(),
            chunk_index: idx,
            content: format!("{} chunk {}", doc, idx),
            embedding: v,
        }
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let store = InMemoryStore::new();
        assert!(store.nearest(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nearest_orders_by_distance() {
        let store = InMemoryStore::new();
        store
            .insert_batch(&[
                rec("a.docx", 0, vec![1.0, 0.0]),
                rec("a.docx", 1, vec![0.0, 1.0]),
                rec("b.docx", 0, vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let hits = store.nearest(&[1.0, 0.1], 2).await.unwrap();
        let keys: Vec<(&str, i64)> = hits
            .iter()
            .map(|h| (h.doc_id.as_str(), h.chunk_index))
            .collect();
        assert_eq!(keys, vec![("a.docx", 0), ("b.docx", 0)]);

        assert!(store.nearest(&[1.0, 0.0], 0).await.unwrap().is_empty());
        assert_eq!(store.nearest(&[1.0, 0.0], 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_reinsert_replaces_and_trims() {
        let store = InMemoryStore::new();
        store
            .insert_batch(&[
                rec("a", 0, vec![1.0]),
                rec("a", 1, vec![2.0]),
                rec("a", 2, vec![3.0]),
                rec("b", 0, vec![4.0]),
            ])
            .await
            .unwrap();
        store
            .insert_batch(&[rec("a", 0, vec![5.0]), rec("a", 1, vec![6.0])])
            .await
            .unwrap();

        let info = store.info().await.unwrap();
        assert_eq!(info.chunks, 3);
        assert_eq!(info.documents, 2);

        let hits = store.nearest(&[5.0], 1).await.unwrap();
        assert_eq!((hits[0].doc_id.as_str(), hits[0].chunk_index), ("a", 0));
        assert_eq!(hits[0].distance, 0.0);
    }

    #[tokio::test]
    async fn test_reinsert_with_index_gap_replaces_whole_document() {
        let store = InMemoryStore::new();
        store
            .insert_batch(&[
                rec("a", 0, vec![1.0]),
                rec("a", 1, vec![2.0]),
                rec("a", 2, vec![3.0]),
                rec("b", 1, vec![4.0]),
            ])
            .await
            .unwrap();
        store
            .insert_batch(&[rec("a", 0, vec![5.0]), rec("a", 2, vec![6.0])])
            .await
            .unwrap();

        let mut keys: Vec<(String, i64)> = store
            .nearest(&[0.0], 10)
            .await
            .unwrap()
            .into_iter()
            .map(|h| (h.doc_id, h.chunk_index))
            .collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![("a".to_string(), 0), ("a".to_string(), 2), ("b".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_dimension_is_fixed_by_first_batch() {
        let store = InMemoryStore::new();
        store.insert_batch(&[rec("a", 0, vec![1.0, 2.0])]).await.unwrap();

        let err = store.insert_batch(&[rec("b", 0, vec![1.0])]).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 1 }));

        let err = store.nearest(&[1.0, 2.0, 3.0], 1).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3 }));

        // The failed batch left nothing behind
        assert_eq!(store.info().await.unwrap().chunks, 1);
    }

    #[tokio::test]
    async fn test_register_model_and_clear() {
        let store = InMemoryStore::new();
        store.register_model("hash", 4).await.unwrap();
        store.register_model("hash", 4).await.unwrap();
        assert!(store.register_model("other", 4).await.is_err());
        assert!(store.register_model("hash", 8).await.is_err());

        store.insert_batch(&[rec("a", 0, vec![0.0; 4])]).await.unwrap();
        store.clear().await.unwrap();

        let info = store.info().await.unwrap();
        assert_eq!(info.chunks, 0);
        assert_eq!(info.dims, None);
        store.register_model("other", 8).await.unwrap();
    }
}
