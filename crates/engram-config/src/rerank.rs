//! Cross-encoder reranker configuration.

use serde::{Deserialize, Serialize};

fn default_model_id() -> String {
    "Xenova/ms-marco-MiniLM-L-6-v2".to_string()
}

const fn default_alpha() -> f64 {
    0.7
}

const fn default_max_length() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankConfig {
    /// Hugging Face repo id of the cross-encoder ONNX model.
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Blend weight between cross-encoder score and bi-encoder prior.
    /// Values outside `(0, 1]` re-default to 0.7 at use time.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Token cap per (query, document) pair, longest-first truncation.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Model file cache directory. Empty means the embedding cache dir.
    #[serde(default)]
    pub cache_dir: String,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            alpha: default_alpha(),
            max_length: default_max_length(),
            cache_dir: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RerankConfig::default();
        assert_eq!(config.model_id, "Xenova/ms-marco-MiniLM-L-6-v2");
        assert!((config.alpha - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.max_length, 256);
    }
}
