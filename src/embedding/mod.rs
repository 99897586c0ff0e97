//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`OllamaEmbedder`]** — calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`OpenAIEmbedder`]** — calls the OpenAI embeddings API.
//! - **`LocalEmbedder`** — runs a sentence-transformer in-process via fastembed;
//!   the model is loaded once and reused for every call.
//! - **[`HashEmbedder`]** — deterministic feature hashing, no model at all.
//!   Useful offline and in tests.
//!
//! Also provides vector utilities:
//! - [`l2_distance`] — Euclidean distance, the store's ranking metric
//! - [`to_vector_literal`] / [`parse_vector_literal`] — the `[0.1,0.2,...]`
//!   text form accepted by vector-typed columns
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the provider named in the
//! configuration:
//!
//! ```rust,no_run
//! # use localmind::config::EmbeddingConfig;
//! # use localmind::embedding::create_embedder;
//! let mut config = EmbeddingConfig::default();
//! config.provider = "hash".to_string();
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "hash");
//! ```
//!
//! # Failures
//!
//! Embedding failures surface as [`RagError::Embedding`] and are never
//! retried; the caller decides whether the current operation is lost.

mod hash;
#[cfg(feature = "local-embeddings-fastembed")]
mod local;

pub use hash::HashEmbedder;
#[cfg(feature = "local-embeddings-fastembed")]
pub use local::LocalEmbedder;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// Trait for embedding providers.
///
/// Implementations are created once at startup and shared behind an `Arc`;
/// they must be deterministic for a fixed model and input.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding(self.model_name(), "empty embedding response"))
    }
}

/// Verify a provider returned one vector of the advertised size per input.
pub(crate) fn check_vectors(
    provider: &str,
    dims: usize,
    expected: usize,
    vectors: &[Vec<f32>],
) -> Result<()> {
    if vectors.len() != expected {
        return Err(RagError::embedding(
            provider,
            format!("expected {} vectors, got {}", expected, vectors.len()),
        ));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(RagError::DimensionMismatch {
            expected: dims,
            actual: bad.len(),
        });
    }
    Ok(())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default
/// `http://localhost:11434`). Requires an embedding model to be pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| RagError::Config("embedding.model required for Ollama provider".into()))?;
        let dims = config
            .dims
            .ok_or_else(|| RagError::Config("embedding.dims required for Ollama provider".into()))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::embedding("ollama", e))?;

        Ok(Self {
            client,
            url,
            model,
            dims,
            batch_size: config.batch_size,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });

            let response = self
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    RagError::embedding(
                        "ollama",
                        format!("connection error (is Ollama running at {}?): {}", self.url, e),
                    )
                })?;

            let status = response.status();
            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                return Err(RagError::embedding(
                    "ollama",
                    format!("API error {}: {}", status, body_text),
                ));
            }

            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| RagError::embedding("ollama", e))?;
            out.extend(parse_vectors(&json, "embeddings", None)?);
        }

        check_vectors("ollama", self.dims, texts.len(), &out)?;
        Ok(out)
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST /v1/embeddings`. Requires the `OPENAI_API_KEY` environment
/// variable to be set.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    batch_size: usize,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| RagError::Config("embedding.model required for OpenAI provider".into()))?;
        let dims = config
            .dims
            .ok_or_else(|| RagError::Config("embedding.dims required for OpenAI provider".into()))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RagError::Config("OPENAI_API_KEY environment variable not set".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::embedding("openai", e))?;

        Ok(Self {
            client,
            api_key,
            model,
            dims,
            batch_size: config.batch_size,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });

            let response = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| RagError::embedding("openai", e))?;

            let status = response.status();
            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                return Err(RagError::embedding(
                    "openai",
                    format!("API error {}: {}", status, body_text),
                ));
            }

            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| RagError::embedding("openai", e))?;
            out.extend(parse_vectors(&json, "data", Some("embedding"))?);
        }

        check_vectors("openai", self.dims, texts.len(), &out)?;
        Ok(out)
    }
}

/// Pull an array of float arrays out of a provider response.
///
/// Ollama returns `{"embeddings": [[...], ...]}`; OpenAI returns
/// `{"data": [{"embedding": [...]}, ...]}`, hence the optional inner key.
fn parse_vectors(
    json: &serde_json::Value,
    array_key: &str,
    inner_key: Option<&str>,
) -> Result<Vec<Vec<f32>>> {
    let items = json
        .get(array_key)
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            RagError::embedding("response", format!("missing '{}' array", array_key))
        })?;

    items
        .iter()
        .map(|item| {
            let values = match inner_key {
                Some(key) => item.get(key),
                None => Some(item),
            }
            .and_then(|v| v.as_array())
            .ok_or_else(|| RagError::embedding("response", "embedding is not an array"))?;

            values
                .iter()
                .map(|v| {
                    v.as_f64()
                        .map(|f| f as f32)
                        .ok_or_else(|| RagError::embedding("response", "non-numeric embedding value"))
                })
                .collect()
        })
        .collect()
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"local"` | `LocalEmbedder` (fastembed) |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"hash"` | [`HashEmbedder`] |
///
/// The local provider loads its model here, which may download weights on
/// first use; call it from a blocking context.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder::new(config.dims.unwrap_or(384)))),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::load(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(RagError::Config(
            "Local embedding provider requires --features local-embeddings-fastembed".into(),
        )),
        other => Err(RagError::Config(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

/// Euclidean (L2) distance between two vectors.
///
/// Callers must pass vectors of equal length; extra components of the
/// longer vector are ignored.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Format a vector as a bracketed, comma-separated literal: `[0.1,-2,3.5]`.
///
/// This is the text form accepted by pgvector's `::vector` cast, and the
/// form stored in the SQLite `embedding` column.
pub fn to_vector_literal(vec: &[f32]) -> String {
    let parts: Vec<String> = vec.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// Parse a literal produced by [`to_vector_literal`].
pub fn parse_vector_literal(s: &str) -> std::result::Result<Vec<f32>, String> {
    let inner = s
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| format!("vector literal must be bracketed: {}", s))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| format!("bad vector component '{}': {}", part.trim(), e))
        })
        .collect()
}
