//! Question → nearest chunks.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::models::RetrievedChunk;
use crate::store::VectorStore;

/// Embeds questions and looks up their nearest chunks.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Up to `top_k` chunks, nearest first, exactly as the store ranks them.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let vector = self.embedder.embed(question).await?;
        let hits = self.store.nearest(&vector, top_k).await?;
        tracing::debug!(top_k, hits = hits.len(), "retrieved context");
        Ok(hits)
    }
}
