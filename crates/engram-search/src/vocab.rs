//! Pre-embedded vocabulary for similarity-based query expansion.

use engram_config::VocabTermSpec;
use engram_embed::Embedder;
use tracing::debug;

use crate::error::SearchError;

/// A vocabulary term with its pre-computed embedding.
#[derive(Debug, Clone)]
pub struct VocabTerm {
    pub term: String,
    pub weight: f32,
    pub embedding: Vec<f32>,
}

/// A set of vocabulary terms embedded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    terms: Vec<VocabTerm>,
}

impl Vocabulary {
    /// Embed the configured terms in one batch.
    ///
    /// # Errors
    ///
    /// Propagates embedding failures; a partially embedded vocabulary is
    /// never constructed.
    pub fn build(specs: &[VocabTermSpec], embedder: &dyn Embedder) -> Result<Self, SearchError> {
        if specs.is_empty() {
            return Ok(Self::default());
        }
        let texts: Vec<String> = specs.iter().map(|s| s.term.clone()).collect();
        let embeddings = embedder.embed_batch(&texts)?;

        let terms = specs
            .iter()
            .zip(embeddings)
            .map(|(spec, embedding)| VocabTerm {
                term: spec.term.clone(),
                weight: spec.weight,
                embedding,
            })
            .collect::<Vec<_>>();

        debug!(count = terms.len(), "vocabulary embedded");
        Ok(Self { terms })
    }

    #[must_use]
    pub fn terms(&self) -> &[VocabTerm] {
        &self.terms
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_embed::HashEmbedder;

    #[test]
    fn build_embeds_every_term() {
        let embedder = HashEmbedder::new(64);
        let vocabulary = Vocabulary::build(
            &[
                VocabTermSpec {
                    term: "caching".to_string(),
                    weight: 0.9,
                },
                VocabTermSpec {
                    term: "eviction".to_string(),
                    weight: 1.0,
                },
            ],
            &embedder,
        )
        .unwrap();

        assert_eq!(vocabulary.terms().len(), 2);
        assert!(vocabulary.terms().iter().all(|t| t.embedding.len() == 64));
        assert!((vocabulary.terms()[0].weight - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_specs_build_an_empty_vocabulary() {
        let embedder = HashEmbedder::new(64);
        let vocabulary = Vocabulary::build(&[], &embedder).unwrap();
        assert!(vocabulary.is_empty());
    }
}
