//! Local embedding model configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_model_id() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_version() -> String {
    "all-MiniLM-L6-v2".to_string()
}

const fn default_dimensions() -> usize {
    384
}

fn default_pooling() -> String {
    "mean".to_string()
}

const fn default_max_seq_len() -> usize {
    256
}

const fn default_normalize() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Hugging Face repo id of the bi-encoder ONNX model.
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Opaque version string recorded on every vector row.
    #[serde(default = "default_version")]
    pub version: String,

    /// Output vector width.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Pooling strategy: `none`, `mean`, or `cls`.
    #[serde(default = "default_pooling")]
    pub pooling: String,

    /// Hard cap on tokenized sequence length per input.
    #[serde(default = "default_max_seq_len")]
    pub max_seq_len: usize,

    /// L2-normalize pooled vectors.
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Output tensor to read. Empty selects the model's first output
    /// (`last_hidden_state` for externally-pooled models, or a direct
    /// sentence-embedding tensor when pooling is `none`).
    #[serde(default)]
    pub output_tensor: String,

    /// Model file cache directory. Empty means `~/.engram/cache/models`.
    #[serde(default)]
    pub cache_dir: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            version: default_version(),
            dimensions: default_dimensions(),
            pooling: default_pooling(),
            max_seq_len: default_max_seq_len(),
            normalize: default_normalize(),
            output_tensor: String::new(),
            cache_dir: String::new(),
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the model cache dir, defaulting to a stable location under
    /// the home directory so models persist across builds and test runs.
    #[must_use]
    pub fn resolved_cache_dir(&self) -> PathBuf {
        if self.cache_dir.is_empty() {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".engram")
                .join("cache")
                .join("models")
        } else {
            PathBuf::from(&self.cache_dir)
        }
    }
}
