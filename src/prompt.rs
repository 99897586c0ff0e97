//! Grounded prompt construction.
//!
//! The prompt tells the model to answer only from the numbered context
//! blocks and to emit [`FALLBACK_PHRASE`] verbatim when they do not contain
//! the answer. Whether the model complies is not checked anywhere.

use std::fmt::Write;

use crate::models::RetrievedChunk;

/// Exact sentence the model is told to give when the context lacks an answer.
pub const FALLBACK_PHRASE: &str = "I don't know based on the provided documents.";

/// Build the prompt for `question` grounded on `context` (in retrieval order).
///
/// Deterministic: the same inputs always produce the same string.
///
/// ```
/// use localmind::models::RetrievedChunk;
/// use localmind::prompt::build_prompt;
///
/// let ctx = vec![RetrievedChunk {
///     doc_id: "handbook.docx".into(),
///     chunk_index: 3,
///     content: "Leave requests go to HR.".into(),
///     distance: 0.2,
/// }];
/// let prompt = build_prompt("Who approves leave?", &ctx);
/// assert!(prompt.contains("[1] (from handbook.docx, chunk 3)\nLeave requests go to HR."));
/// assert!(prompt.contains("Who approves leave?"));
/// ```
pub fn build_prompt(question: &str, context: &[RetrievedChunk]) -> String {
    let mut documents = String::new();
    for (i, chunk) in context.iter().enumerate() {
        // Writing to a String cannot fail
        let _ = write!(
            documents,
            "[{}] (from {}, chunk {})\n{}\n\n",
            i + 1,
            chunk.doc_id,
            chunk.chunk_index,
            chunk.content
        );
    }

    format!(
        "You are an internal company assistant.\n\
         \n\
         Use ONLY the information from the documents below to answer the user's question.\n\
         If the answer is not present in the documents, say exactly:\n\
         \"{FALLBACK_PHRASE}\"\n\
         \n\
         Be concise and clear.\n\
         \n\
         === DOCUMENTS ===\n\
         {documents}\
         === QUESTION ===\n\
         {question}\n\
         \n\
         === ANSWER ===\n"
    )
}
