//! Question answering: retrieval, prompt, generation.

use std::sync::Arc;

use crate::error::{RagError, Result};
use crate::llm::LlmBackend;
use crate::models::{Answer, RetrievedChunk};
use crate::prompt::build_prompt;
use crate::retrieval::Retriever;

/// Answer returned without calling the model when retrieval finds nothing.
pub const NO_DOCUMENTS_MESSAGE: &str = "I couldn't find any relevant documents.";

/// Orchestrates one question from retrieval to a trimmed answer.
#[derive(Clone)]
pub struct AnswerService {
    retriever: Retriever,
    llm: Arc<dyn LlmBackend>,
    default_top_k: usize,
    max_top_k: usize,
}

impl AnswerService {
    pub fn new(
        retriever: Retriever,
        llm: Arc<dyn LlmBackend>,
        default_top_k: usize,
        max_top_k: usize,
    ) -> Self {
        Self {
            retriever,
            llm,
            default_top_k,
            max_top_k,
        }
    }

    /// Resolve a requested `top_k`: default when absent, capped at the maximum.
    pub fn effective_top_k(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.default_top_k),
            Some(0) => Err(RagError::InvalidRequest("top_k must be >= 1".into())),
            Some(k) => Ok(k.min(self.max_top_k)),
        }
    }

    /// Answer `question` from the `top_k` nearest chunks.
    ///
    /// The question reaches the prompt exactly as given.
    pub async fn answer(&self, question: &str, top_k: Option<usize>) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidRequest("question must not be empty".into()));
        }
        let top_k = self.effective_top_k(top_k)?;

        let context = self.retriever.retrieve(question, top_k).await?;
        if context.is_empty() {
            tracing::info!("no relevant chunks, skipping generation");
            return Ok(Answer {
                text: NO_DOCUMENTS_MESSAGE.to_string(),
                sources: Vec::new(),
            });
        }

        let prompt = build_prompt(question, &context);
        let text = self.llm.generate(&prompt).await?;
        tracing::info!(
            model = self.llm.model_name(),
            sources = context.len(),
            "answered question"
        );

        Ok(Answer {
            text: text.trim().to_string(),
            sources: context.iter().map(RetrievedChunk::source_ref).collect(),
        })
    }
}
