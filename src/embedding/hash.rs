//! Feature-hashing embedder.
//!
//! Maps each lowercase alphanumeric token to one of `dims` buckets with
//! FNV-1a and a sign bit, then L2-normalises. Texts sharing vocabulary land
//! close together, which is enough for offline smoke tests and demos. It is
//! not a semantic model.

use async_trait::async_trait;

use super::Embedder;
use crate::error::Result;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic bag-of-words embedder with no model weights.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    /// Embed synchronously. Empty input maps to the zero vector.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(&token.to_lowercase());
            let bucket = (h % self.dims as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(FNV_OFFSET, |acc, b| {
        (acc ^ b as u64).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::l2_distance;

    #[test]
    fn test_deterministic_and_normalised() {
        let e = HashEmbedder::new(64);
        let a = e.embed_sync("The quick brown fox");
        let b = e.embed_sync("The quick brown fox");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let e = HashEmbedder::new(64);
        assert_eq!(e.embed_sync("Hello, World!"), e.embed_sync("hello world"));
    }

    #[test]
    fn test_shared_vocabulary_is_closer() {
        let e = HashEmbedder::new(256);
        let q = e.embed_sync("invoice payment terms");
        let near = e.embed_sync("payment terms for every invoice are thirty days");
        let far = e.embed_sync("the office kitchen closes at noon");
        assert!(l2_distance(&q, &near) < l2_distance(&q, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let e = HashEmbedder::new(8);
        assert_eq!(e.embed_sync("  ... "), vec![0.0; 8]);
    }
}
