//! The `Embedder` capability set and small vector helpers.

use crate::error::EmbedError;

/// A bi-encoder embedding service.
///
/// Implementations are thread-safe; a single instance serializes its own
/// inference internally. All providers share these rules:
///
/// - empty input text produces an all-zero vector of [`Self::dimensions`]
///   width without invoking the model
/// - `embed_batch` preserves input order and length, and routes every
///   non-empty input through a single inference call
/// - after [`Self::close`], embedding calls return [`EmbedError::Shutdown`]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// Opaque version string recorded on vector rows for staleness checks.
    fn version(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// Embed one text. Deterministic for a given model version and input.
    ///
    /// # Errors
    ///
    /// [`EmbedError::EmbedFailure`] on tokenizer or inference failure,
    /// [`EmbedError::Shutdown`] after close.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embed a batch, preserving order and length.
    ///
    /// # Errors
    ///
    /// Same as [`Self::embed`]; a failure discards the whole batch.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Release the model session. Idempotent.
    fn close(&self);
}

/// Zero vector of the given width, the canonical embedding of empty text.
#[must_use]
pub fn zero_vector(dimensions: usize) -> Vec<f32> {
    vec![0.0; dimensions]
}

/// Cosine similarity between two vectors; 0.0 when either norm is zero.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same dimensionality");
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// L2-normalize in place; a zero vector is left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5_f32, -0.25, 0.75];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_minus_one() {
        let a = vec![1.0_f32, 2.0, 3.0];
        let b: Vec<f32> = a.iter().map(|x| -x).collect();
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        let a = vec![1.0_f32, 2.0];
        let z = zero_vector(2);
        assert!(cosine_similarity(&a, &z).abs() < f32::EPSILON);
    }

    #[test]
    fn normalize_produces_unit_norm() {
        let mut v = vec![3.0_f32, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);

        let mut z = zero_vector(4);
        l2_normalize(&mut z);
        assert!(z.iter().all(|x| *x == 0.0));
    }
}
