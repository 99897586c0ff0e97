//! Sliding-window text chunker.
//!
//! Splits document text into overlapping windows of at most `max_chars`
//! characters. Windows are measured in Unicode scalar values, so multi-byte
//! text never splits inside a character.
//!
//! # Algorithm
//!
//! 1. Reject an unusable window (`max_chars == 0` or `overlap >= max_chars`).
//! 2. Take `text[start..start + max_chars]` (clamped to the end of text).
//! 3. Stop once a window reaches the end of the text.
//! 4. Otherwise advance to `end - overlap` and repeat.
//!
//! Every chunk after the first begins with the last `overlap` characters of
//! its predecessor, so dropping those characters and concatenating
//! reconstructs the input exactly.
//!
//! # Example
//!
//! ```rust
//! use localmind::chunk::chunk_text;
//!
//! let chunks = chunk_text("Alpha beta. Gamma delta. Epsilon zeta.", 20, 5).unwrap();
//! assert_eq!(chunks, vec!["Alpha beta. Gamma de", "ma delta. Epsilon ze", "on zeta."]);
//! ```

use thiserror::Error;

/// Chunker configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("chunk window is invalid: max_chars={max_chars}, overlap={overlap} (need 0 <= overlap < max_chars)")]
    InvalidWindow { max_chars: usize, overlap: usize },
}

/// Check that a window configuration makes forward progress.
pub fn validate_window(max_chars: usize, overlap: usize) -> Result<(), ChunkError> {
    if max_chars == 0 || overlap >= max_chars {
        return Err(ChunkError::InvalidWindow { max_chars, overlap });
    }
    Ok(())
}

/// Split `text` into overlapping windows of at most `max_chars` characters.
///
/// Returns an empty vector for empty or whitespace-only text.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Result<Vec<String>, ChunkError> {
    validate_window(max_chars, overlap)?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char, plus the end of the string, so windows can
    // be sliced by character count.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let n = bounds.len() - 1;

    let mut chunks = Vec::with_capacity(expected_chunk_count(n, max_chars, overlap));
    let mut start = 0usize;

    loop {
        let end = (start + max_chars).min(n);
        chunks.push(text[bounds[start]..bounds[end]].to_string());

        if end == n {
            break;
        }

        let next_start = end.saturating_sub(overlap);
        debug_assert!(next_start > start, "chunker must move forward");
        start = next_start;
    }

    Ok(chunks)
}

/// Number of windows [`chunk_text`] produces for a text of `len` characters.
pub fn expected_chunk_count(len: usize, max_chars: usize, overlap: usize) -> usize {
    if len == 0 {
        return 0;
    }
    if len <= max_chars {
        return 1;
    }
    let step = max_chars.saturating_sub(overlap).max(1);
    (len - overlap).div_ceil(step)
}
