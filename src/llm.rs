//! Language-model backend.
//!
//! [`OllamaBackend`] posts to an Ollama-style `/api/generate` endpoint and
//! reads the newline-delimited JSON reply:
//!
//! ```text
//! {"model":"llama3.2","response":"The ","done":false}
//! {"model":"llama3.2","response":"answer","done":false}
//! {"model":"llama3.2","response":"","done":true}
//! ```
//!
//! [`GenerateStream`] turns the raw byte stream into text fragments. Network
//! chunks may split a line anywhere, so bytes are buffered until a newline
//! arrives. The stream ends at the first `done: true` or when the
//! connection closes.
//!
//! A whole generation is bounded by `llm.timeout_secs`. On timeout the
//! in-flight request is dropped, which closes the connection.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{RagError, Result};

/// Trait for text generation backends.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`, returning the full text.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the configured backend. Only the Ollama protocol is supported.
pub fn create_backend(config: &LlmConfig) -> Result<Arc<dyn LlmBackend>> {
    Ok(Arc::new(OllamaBackend::from_config(config)?))
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One NDJSON line of a `/api/generate` reply.
#[derive(Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct OllamaBackend {
    client: reqwest::Client,
    url: String,
    model: String,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(
            &config.url,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn stream_generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| RagError::Backend {
                status: 502,
                body: format!("connection error (is Ollama running at {}?): {}", self.url, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        collect_response(GenerateStream::new(response.bytes_stream().boxed())).await
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "calling LLM");

        tokio::time::timeout(self.timeout, self.stream_generate(prompt))
            .await
            .map_err(|_| {
                RagError::Timeout(format!(
                    "LLM generation after {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
    }
}

/// Concatenate every fragment of a generation.
pub async fn collect_response<S>(mut stream: S) -> Result<String>
where
    S: Stream<Item = Result<String>> + Unpin,
{
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}

/// Parses an NDJSON `/api/generate` byte stream into response fragments.
pub struct GenerateStream<S> {
    inner: S,
    buffer: Vec<u8>,
    finished: bool,
}

impl<S> GenerateStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            finished: false,
        }
    }

    /// Parse one line. `Ok(None)` means nothing to emit.
    fn parse_line(&mut self, line: &[u8]) -> Result<Option<String>> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let parsed: GenerateLine = serde_json::from_str(line).map_err(|e| RagError::Backend {
            status: 200,
            body: format!("malformed stream line {:?}: {}", line, e),
        })?;

        if let Some(error) = parsed.error {
            return Err(RagError::Backend {
                status: 200,
                body: error,
            });
        }
        if parsed.done {
            self.finished = true;
        }
        Ok((!parsed.response.is_empty()).then_some(parsed.response))
    }
}

impl<S, E> Stream for GenerateStream<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Display,
{
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.finished {
                return Poll::Ready(None);
            }

            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                match self.parse_line(&line) {
                    Ok(Some(fragment)) => return Poll::Ready(Some(Ok(fragment))),
                    Ok(None) => continue,
                    Err(e) => {
                        self.finished = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                }
            }

            match self.inner.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(bytes))) => self.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(RagError::Backend {
                        status: 200,
                        body: format!("stream interrupted: {}", e),
                    })));
                }
                Poll::Ready(None) => {
                    // Connection closed; a last line may lack its newline
                    let rest = std::mem::take(&mut self.buffer);
                    self.finished = true;
                    return match self.parse_line(&rest) {
                        Ok(Some(fragment)) => Poll::Ready(Some(Ok(fragment))),
                        Ok(None) => Poll::Ready(None),
                        Err(e) => Poll::Ready(Some(Err(e))),
                    };
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
