//! In-process embeddings via fastembed.
//!
//! Models are downloaded on first use from Hugging Face and cached. After
//! that no network calls are needed. The ONNX session is created once in
//! [`LocalEmbedder::load`] and shared; inference runs on tokio's blocking
//! pool so it never stalls the async workers.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{check_vectors, Embedder};
use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// Default model, matching the sentence-transformers `all-MiniLM-L6-v2`.
const DEFAULT_MODEL: &str = "all-minilm-l6-v2";

/// Embedding provider backed by a fastembed `TextEmbedding` session.
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<Mutex<fastembed::TextEmbedding>>,
}

impl LocalEmbedder {
    /// Load (and, the first time, download) the configured model.
    ///
    /// Blocking; call from `spawn_blocking` inside a runtime.
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let (fastembed_model, native_dims) = resolve_model(&model_name)?;

        if let Some(dims) = config.dims {
            if dims != native_dims {
                return Err(RagError::Config(format!(
                    "embedding.dims = {} but model '{}' produces {}-dim vectors",
                    dims, model_name, native_dims
                )));
            }
        }

        tracing::info!(model = %model_name, dims = native_dims, "loading local embedding model");

        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
        )
        .map_err(|e| {
            RagError::embedding(
                "local",
                format!("failed to initialize model '{}': {}", model_name, e),
            )
        })?;

        Ok(Self {
            model_name,
            dims: native_dims,
            batch_size: config.batch_size,
            model: Arc::new(Mutex::new(model)),
        })
    }
}

fn resolve_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    match name {
        "all-minilm-l6-v2" | "all-MiniLM-L6-v2" => Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((fastembed::EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768)),
        "bge-large-en-v1.5" => Ok((fastembed::EmbeddingModel::BGELargeENV15, 1024)),
        "nomic-embed-text-v1.5" => Ok((fastembed::EmbeddingModel::NomicEmbedTextV15, 768)),
        "multilingual-e5-small" => Ok((fastembed::EmbeddingModel::MultilingualE5Small, 384)),
        other => Err(RagError::Config(format!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small",
            other
        ))),
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;
        let owned = texts.to_vec();

        let vectors = tokio::task::spawn_blocking(move || {
            let mut session = model
                .lock()
                .map_err(|_| RagError::embedding("local", "embedding model lock poisoned"))?;
            session
                .embed(owned, Some(batch_size))
                .map_err(|e| RagError::embedding("local", e))
        })
        .await
        .map_err(|e| RagError::embedding("local", e))??;

        check_vectors("local", self.dims, texts.len(), &vectors)?;
        Ok(vectors)
    }
}
