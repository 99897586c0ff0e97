//! Application context.
//!
//! Everything the pipeline needs at runtime (configuration, embedding model,
//! vector store, LLM backend) is built once here and handed to components
//! explicitly. Commands create an [`AppContext`] at startup and call
//! [`AppContext::shutdown`] before exiting so database connections are
//! closed cleanly.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::answer::AnswerService;
use crate::config::Config;
use crate::embedding::{self, Embedder};
use crate::llm::{self, LlmBackend};
use crate::retrieval::Retriever;
use crate::store::{self, VectorStore};

pub struct AppContext {
    pub config: Config,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn LlmBackend>,
}

impl AppContext {
    /// Load the embedding model, open the store and bind it to the model.
    ///
    /// Fails if the store was built with a different model or dimension.
    pub async fn init(config: Config) -> Result<Self> {
        let embedding_config = config.embedding.clone();
        // Model loading may download weights and is CPU-bound
        let embedder = tokio::task::spawn_blocking(move || {
            embedding::create_embedder(&embedding_config)
        })
        .await
        .context("embedding model loader panicked")?
        .context("Failed to initialize embedding model")?;

        let store = store::open(&config)
            .await
            .with_context(|| format!("Failed to open vector store at {}", config.db.url))?;
        store
            .register_model(embedder.model_name(), embedder.dims())
            .await
            .context("Vector store is incompatible with the configured embedding model")?;

        let llm = llm::create_backend(&config.llm).context("Failed to create LLM backend")?;

        tracing::info!(
            embedder = embedder.model_name(),
            dims = embedder.dims(),
            store = store.backend(),
            llm = llm.model_name(),
            "context initialized"
        );

        Ok(Self::from_parts(config, embedder, store, llm))
    }

    /// Assemble a context from prebuilt components.
    pub fn from_parts(
        config: Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmBackend>,
    ) -> Self {
        Self {
            config,
            embedder,
            store,
            llm,
        }
    }

    pub fn retriever(&self) -> Retriever {
        Retriever::new(self.embedder.clone(), self.store.clone())
    }

    pub fn answer_service(&self) -> AnswerService {
        AnswerService::new(
            self.retriever(),
            self.llm.clone(),
            self.config.retrieval.top_k,
            self.config.retrieval.max_top_k,
        )
    }

    /// Close the store's connections.
    pub async fn shutdown(self) {
        self.store.close().await;
        tracing::debug!("context shut down");
    }
}
