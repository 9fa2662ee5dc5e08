//! Deterministic feature-hashing embedder.
//!
//! A last-resort provider that needs no model files or network: tokens are
//! feature-hashed into signed buckets and L2-normalized. Texts sharing
//! vocabulary land near each other in cosine space, which is enough for
//! offline development and for exercising store/search plumbing in tests.
//! Not a substitute for a real bi-encoder.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::EmbedError;
use crate::service::{Embedder, l2_normalize, zero_vector};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(token: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in token.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Feature-hashing embedding provider.
pub struct HashEmbedder {
    dimensions: usize,
    version: String,
    closed: AtomicBool,
}

impl HashEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            version: "hash-v1".to_string(),
            closed: AtomicBool::new(false),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = zero_vector(self.dimensions);
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token);
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hash % self.dimensions as u64) as usize;
            // One hash bit picks the sign so unrelated tokens cancel
            // rather than accumulate.
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "token-hash"
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EmbedError::Shutdown);
        }
        if text.trim().is_empty() {
            return Ok(zero_vector(self.dimensions));
        }
        Ok(self.embed_one(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EmbedError::Shutdown);
        }
        Ok(texts
            .iter()
            .map(|t| {
                if t.trim().is_empty() {
                    zero_vector(self.dimensions)
                } else {
                    self.embed_one(t)
                }
            })
            .collect())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
