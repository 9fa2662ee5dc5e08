//! Model registry: version string → embedder factory.
//!
//! The registry is the sole indirection through which the rest of the
//! workspace obtains embedding services. Factories run lazily, at most once
//! per version; a lost build race simply discards the duplicate instance.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use engram_core::ModelMetadata;
use tracing::debug;

use crate::error::EmbedError;
use crate::service::Embedder;

/// Factory closure building a concrete embedder on first use.
pub type EmbedderFactory = Arc<dyn Fn() -> Result<Arc<dyn Embedder>, EmbedError> + Send + Sync>;

struct RegisteredModel {
    meta: ModelMetadata,
    factory: EmbedderFactory,
    instance: OnceLock<Arc<dyn Embedder>>,
}

#[derive(Default)]
struct Inner {
    models: HashMap<String, RegisteredModel>,
    default_version: Option<String>,
}

/// Concurrent map from model version to factory, with a mutable default.
#[derive(Default)]
pub struct ModelRegistry {
    inner: RwLock<Inner>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. If `meta.default` is set, this version becomes the
    /// registry default; the last default registration wins. Re-registering
    /// a version replaces its factory and drops any built instance.
    pub fn register(&self, meta: ModelMetadata, factory: EmbedderFactory) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let version = meta.version.clone();
        if meta.default {
            inner.default_version = Some(version.clone());
        }
        debug!(version = %version, default = meta.default, "model registered");
        inner.models.insert(
            version,
            RegisteredModel {
                meta,
                factory,
                instance: OnceLock::new(),
            },
        );
    }

    /// Resolve a version to a (lazily built) embedder.
    ///
    /// # Errors
    ///
    /// [`EmbedError::UnknownModel`] on a registry miss; any factory error
    /// otherwise.
    pub fn get(&self, version: &str) -> Result<Arc<dyn Embedder>, EmbedError> {
        let factory = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            let entry = inner
                .models
                .get(version)
                .ok_or_else(|| EmbedError::UnknownModel(version.to_string()))?;
            if let Some(instance) = entry.instance.get() {
                return Ok(Arc::clone(instance));
            }
            Arc::clone(&entry.factory)
        };

        // Build outside the lock; a concurrent builder may win the race,
        // in which case this instance is dropped unused.
        let built = factory()?;

        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let entry = inner
            .models
            .get(version)
            .ok_or_else(|| EmbedError::UnknownModel(version.to_string()))?;
        Ok(Arc::clone(entry.instance.get_or_init(|| built)))
    }

    /// Resolve the default model.
    ///
    /// # Errors
    ///
    /// [`EmbedError::UnknownModel`] when no default has been registered.
    pub fn get_default(&self) -> Result<Arc<dyn Embedder>, EmbedError> {
        let version = self
            .default_version()
            .ok_or_else(|| EmbedError::UnknownModel("<default>".to_string()))?;
        self.get(&version)
    }

    /// The current default version string, if any.
    #[must_use]
    pub fn default_version(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .default_version
            .clone()
    }

    /// Metadata for every registered model.
    #[must_use]
    pub fn list(&self) -> Vec<ModelMetadata> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut metas: Vec<ModelMetadata> = inner.models.values().map(|m| m.meta.clone()).collect();
        metas.sort_by(|a, b| a.version.cmp(&b.version));
        metas
    }

    /// Close every built instance. Registered factories stay usable, so a
    /// later `get` rebuilds.
    pub fn close_all(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for model in inner.models.values_mut() {
            if let Some(instance) = model.instance.take() {
                instance.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashEmbedder;
    use pretty_assertions::assert_eq;

    fn hash_meta(version: &str, default: bool) -> ModelMetadata {
        ModelMetadata {
            name: "token-hash".to_string(),
            version: version.to_string(),
            dimensions: 64,
            default,
        }
    }

    fn hash_factory(dims: usize) -> EmbedderFactory {
        Arc::new(move || Ok(Arc::new(HashEmbedder::new(dims)) as Arc<dyn Embedder>))
    }

    #[test]
    fn get_unknown_version_fails() {
        let registry = ModelRegistry::new();
        let err = registry.get("nope").unwrap_err();
        assert!(matches!(err, EmbedError::UnknownModel(v) if v == "nope"));
    }

    #[test]
    fn last_default_registration_wins() {
        let registry = ModelRegistry::new();
        registry.register(hash_meta("a-v1", true), hash_factory(64));
        registry.register(hash_meta("b-v1", true), hash_factory(64));
        registry.register(hash_meta("c-v1", false), hash_factory(64));
        assert_eq!(registry.default_version().as_deref(), Some("b-v1"));
    }

    #[test]
    fn instances_are_built_once_and_shared() {
        let registry = ModelRegistry::new();
        registry.register(hash_meta("a-v1", true), hash_factory(64));
        let first = registry.get("a-v1").unwrap();
        let second = registry.get("a-v1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn default_resolution_goes_through_get() {
        let registry = ModelRegistry::new();
        registry.register(hash_meta("a-v1", true), hash_factory(32));
        let embedder = registry.get_default().unwrap();
        assert_eq!(embedder.dimensions(), 32);
        assert_eq!(embedder.version(), "hash-v1");
    }

    #[test]
    fn list_reports_registered_metadata() {
        let registry = ModelRegistry::new();
        registry.register(hash_meta("b-v1", false), hash_factory(64));
        registry.register(hash_meta("a-v1", true), hash_factory(64));
        let versions: Vec<String> = registry.list().into_iter().map(|m| m.version).collect();
        assert_eq!(versions, vec!["a-v1", "b-v1"]);
    }

    #[test]
    fn close_all_releases_then_rebuilds() {
        let registry = ModelRegistry::new();
        registry.register(hash_meta("a-v1", true), hash_factory(16));
        let first = registry.get("a-v1").unwrap();
        registry.close_all();
        assert!(matches!(first.embed("x").unwrap_err(), EmbedError::Shutdown));
        // A later get builds a fresh instance.
        let rebuilt = registry.get("a-v1").unwrap();
        assert!(rebuilt.embed("x").is_ok());
    }
}
