//! Shared engine wiring for CLI commands: registry → embedder → store →
//! retriever.

use std::sync::Arc;

use anyhow::Context as _;
use engram_config::EngramConfig;
use engram_search::{QueryExpander, Retriever, Vocabulary};
use engram_store::VectorStore;

/// Everything a command needs, built once per invocation.
pub struct EngineContext {
    pub store: Arc<VectorStore>,
    pub expander: QueryExpander,
    pub retriever: Retriever,
}

impl EngineContext {
    /// Wire the engine from configuration. `model_override` selects a
    /// registered model version other than the default (e.g. `hash-v1`
    /// for offline use).
    pub fn build(config: &EngramConfig, model_override: Option<&str>) -> anyhow::Result<Self> {
        let registry = engram_embed::standard_registry(config);
        let embedder = match model_override {
            Some(version) => registry
                .get(version)
                .with_context(|| format!("resolving model '{version}'"))?,
            None => registry.get_default().context("resolving default model")?,
        };

        let store = Arc::new(
            engram_store::open_store(config, Arc::clone(&embedder))
                .context("opening vector store")?,
        );

        let expander = if config.expansion.vocabulary.is_empty() {
            QueryExpander::new(config.expansion.clone())
        } else {
            let vocabulary = Vocabulary::build(&config.expansion.vocabulary, embedder.as_ref())
                .context("embedding expansion vocabulary")?;
            QueryExpander::with_vocabulary(
                config.expansion.clone(),
                Arc::clone(&embedder),
                vocabulary,
            )
        };

        Ok(Self {
            retriever: Retriever::new(Arc::clone(&store), expander.clone()),
            expander,
            store,
        })
    }
}
