//! Query expansion configuration.

use serde::{Deserialize, Serialize};

const fn default_max_expansions() -> usize {
    4
}

const fn default_min_similarity() -> f32 {
    0.5
}

const fn default_enable_vocabulary() -> bool {
    true
}

/// A vocabulary term available for similarity-based expansion.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VocabTermSpec {
    pub term: String,
    /// Multiplier applied on top of the similarity-derived weight.
    #[serde(default = "default_term_weight")]
    pub weight: f32,
}

const fn default_term_weight() -> f32 {
    1.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExpansionConfig {
    /// Upper bound on emitted query variants, original included.
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,

    /// Cosine floor for vocabulary candidates.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    #[serde(default = "default_enable_vocabulary")]
    pub enable_vocabulary_expansion: bool,

    /// Domain vocabulary; empty disables vocabulary expansion regardless
    /// of the flag.
    #[serde(default)]
    pub vocabulary: Vec<VocabTermSpec>,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_expansions: default_max_expansions(),
            min_similarity: default_min_similarity(),
            enable_vocabulary_expansion: default_enable_vocabulary(),
            vocabulary: Vec::new(),
        }
    }
}
