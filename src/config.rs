//! Configuration parsing and validation.
//!
//! LocalMind reads a TOML file (default `./config/localmind.toml`). Every
//! section has defaults, so a missing file section falls back to the values
//! the pipeline was tuned with (1000-char windows, 200-char overlap, top-5
//! retrieval, a local Ollama on port 11434).
//!
//! After parsing, a handful of connection settings can be overridden from the
//! environment (a `.env` file is loaded first if present):
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `LOCALMIND_DB_URL` | `db.url` |
//! | `EMBED_MODEL_NAME` | `embedding.model` |
//! | `LLM_MODEL` | `llm.model` |
//! | `LLM_URL` | `llm.url` |

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk;
use crate::extract::DocumentKind;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// `sqlite:<path>` or `postgres://...` (the latter needs the `pgvector` feature).
    #[serde(default = "default_db_url")]
    pub url: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
        }
    }
}

fn default_db_url() -> String {
    "sqlite:./data/localmind.sqlite".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap: default_overlap(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Upper bound on a whole generation, including streaming.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_llm_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_model() -> String {
    "llama3.2".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_max_top_k() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// File extensions (without the dot, case-insensitive) to ingest.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            extensions: default_extensions(),
            recursive: false,
            exclude_globs: Vec::new(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/docs")
}

fn default_extensions() -> Vec<String> {
    ["docx", "pdf", "md", "txt"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    /// Apply environment overrides for connection settings.
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = env_opt("LOCALMIND_DB_URL") {
            self.db.url = url;
        }
        if let Some(model) = env_opt("EMBED_MODEL_NAME") {
            self.embedding.model = Some(model);
        }
        if let Some(model) = env_opt("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = env_opt("LLM_URL") {
            self.llm.url = url;
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        chunk::validate_window(self.chunking.max_chars, self.chunking.overlap)
            .with_context(|| "Invalid [chunking] section")?;

        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.max_top_k < self.retrieval.top_k {
            bail!(
                "retrieval.max_top_k ({}) must be >= retrieval.top_k ({})",
                self.retrieval.max_top_k,
                self.retrieval.top_k
            );
        }
        if self.llm.timeout_secs == 0 {
            bail!("llm.timeout_secs must be > 0");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.embedding.provider.as_str() {
            "local" | "ollama" | "openai" | "hash" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be local, ollama, openai, or hash.",
                other
            ),
        }

        if matches!(self.embedding.provider.as_str(), "ollama" | "openai") {
            if self.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.dims.unwrap_or(0) == 0 {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }

        if !(self.db.url.starts_with("sqlite:")
            || self.db.url.starts_with("postgres://")
            || self.db.url.starts_with("postgresql://"))
        {
            bail!(
                "db.url must start with sqlite: or postgres:// (got '{}')",
                self.db.url
            );
        }

        if self.ingest.extensions.is_empty() {
            bail!("ingest.extensions must list at least one extension");
        }
        for ext in &self.ingest.extensions {
            if DocumentKind::from_extension(ext.trim_start_matches('.')).is_none() {
                bail!(
                    "ingest.extensions: no text extractor for '{}' (supported: docx, pdf, txt, text, md, markdown)",
                    ext
                );
            }
        }

        Ok(())
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// Load `.env` (if present), parse the TOML file, apply env overrides and validate.
///
/// A missing config file is not an error: defaults plus environment
/// overrides are used, which is enough to run against a local Ollama.
pub fn load_config(path: &Path) -> Result<Config> {
    dotenvy::dotenv().ok();

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Parse TOML configuration text without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.chunking.max_chars, 1000);
        assert_eq!(cfg.chunking.overlap, 200);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.llm.model, "llama3.2");
        assert_eq!(cfg.llm.url, "http://localhost:11434");
        assert_eq!(cfg.embedding.provider, "local");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_sections_parse() {
        let cfg = parse_config(
            r#"
            [db]
            url = "sqlite:/tmp/x.sqlite"

            [chunking]
            max_chars = 20
            overlap = 5

            [embedding]
            provider = "hash"
            dims = 64

            [ingest]
            data_dir = "/srv/docs"
            extensions = ["docx"]
            recursive = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.db.url, "sqlite:/tmp/x.sqlite");
        assert_eq!(cfg.chunking.max_chars, 20);
        assert_eq!(cfg.embedding.dims, Some(64));
        assert_eq!(cfg.ingest.extensions, vec!["docx"]);
        assert!(cfg.ingest.recursive);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        let cfg = parse_config("[chunking]\nmax_chars = 10\noverlap = 10\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let cfg = parse_config("[embedding]\nprovider = \"magic\"\n").unwrap();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("Unknown embedding provider"));
    }

    #[test]
    fn test_remote_provider_requires_model_and_dims() {
        let cfg = parse_config("[embedding]\nprovider = \"ollama\"\n").unwrap();
        assert!(cfg.validate().is_err());
        let cfg = parse_config(
            "[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n",
        )
        .unwrap();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let cfg = parse_config("[ingest]\nextensions = [\"txt\", \"rtf\"]\n").unwrap();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("'rtf'"), "unexpected error: {}", err);

        let cfg = parse_config("[ingest]\nextensions = [\"TXT\", \"Markdown\"]\n").unwrap();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_bad_db_url_rejected() {
        let cfg = parse_config("[db]\nurl = \"mysql://nope\"\n").unwrap();
        assert!(cfg.validate().is_err());
    }
}
