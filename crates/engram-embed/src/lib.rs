//! # engram-embed
//!
//! Embedding generation for Engram: the `Embedder` capability set, the
//! local ONNX bi-encoder (all-MiniLM-L6-v2, 384-dim), an OpenAI-compatible
//! HTTP provider, a deterministic feature-hashing fallback, and the model
//! registry that hands all of them out.
//!
//! Inference is synchronous and mutex-serialized per model instance; call
//! through `tokio::task::spawn_blocking` from async contexts.

pub mod error;
pub mod hash;
pub mod onnx;
pub mod openai;
pub mod pooling;
pub mod registry;
pub mod runtime;
pub mod service;

use std::sync::Arc;

use engram_config::EngramConfig;
use engram_core::ModelMetadata;

pub use error::EmbedError;
pub use hash::HashEmbedder;
pub use onnx::OnnxEmbedder;
pub use openai::OpenAiEmbedder;
pub use pooling::Pooling;
pub use registry::{EmbedderFactory, ModelRegistry};
pub use service::{Embedder, cosine_similarity, l2_normalize, zero_vector};

/// Build a registry holding the standard providers:
///
/// - the configured ONNX bi-encoder, as the default
/// - the OpenAI-compatible HTTP provider, when an API key is configured
/// - the feature-hashing fallback (`hash-v1`), always available
#[must_use]
pub fn standard_registry(config: &EngramConfig) -> ModelRegistry {
    let registry = ModelRegistry::new();

    let embedding = config.embedding.clone();
    registry.register(
        ModelMetadata {
            name: embedding.model_id.clone(),
            version: embedding.version.clone(),
            dimensions: embedding.dimensions,
            default: true,
        },
        Arc::new(move || Ok(Arc::new(OnnxEmbedder::new(&embedding)?) as Arc<dyn Embedder>)),
    );

    if config.openai.is_configured() {
        let openai = config.openai.clone();
        registry.register(
            ModelMetadata {
                name: openai.model.clone(),
                version: format!("openai:{}", openai.model),
                dimensions: openai.dimensions,
                default: false,
            },
            Arc::new(move || {
                Ok(Arc::new(OpenAiEmbedder::new(openai.clone())?) as Arc<dyn Embedder>)
            }),
        );
    }

    let dims = config.embedding.dimensions;
    registry.register(
        ModelMetadata {
            name: "token-hash".to_string(),
            version: "hash-v1".to_string(),
            dimensions: dims,
            default: false,
        },
        Arc::new(move || Ok(Arc::new(HashEmbedder::new(dims)) as Arc<dyn Embedder>)),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_defaults_to_the_onnx_model() {
        let config = EngramConfig::default();
        let registry = standard_registry(&config);
        assert_eq!(
            registry.default_version().as_deref(),
            Some("all-MiniLM-L6-v2")
        );
        // The hash fallback is always registered and buildable offline.
        let hash = registry.get("hash-v1").unwrap();
        assert_eq!(hash.dimensions(), 384);
    }

    #[test]
    fn openai_provider_registers_only_with_credentials() {
        let mut config = EngramConfig::default();
        let registry = standard_registry(&config);
        assert!(registry.get("openai:text-embedding-3-small").is_err());

        config.openai.api_key = "sk-test".into();
        let registry = standard_registry(&config);
        let provider = registry.get("openai:text-embedding-3-small").unwrap();
        assert_eq!(provider.dimensions(), 1536);
    }
}
