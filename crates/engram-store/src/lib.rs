//! # engram-store
//!
//! Vector persistence and caching for Engram: the `VectorBackend`
//! capability set with DuckDB and in-memory implementations, the
//! `VectorStore` facade (filtered cosine top-k, model-version staleness,
//! health reporting), the two-tier query cache with single-flight
//! deduplication and two-phase eviction, and rate-limited bulk import.
//!
//! DuckDB access is synchronous; call through `tokio::task::spawn_blocking`
//! from async contexts.

pub mod backend;
pub mod bulk;
pub mod cache;
pub mod duckdb_backend;
pub mod error;
pub mod memory;
pub mod rebuild;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use engram_config::EngramConfig;
use engram_embed::Embedder;

pub use backend::{BackendHit, QueryFilter, VectorBackend};
pub use bulk::{BulkError, BulkImporter, BulkOutcome};
pub use cache::{CacheStatsSnapshot, EmbeddingCache, ResultCache, spawn_cleaner};
pub use duckdb_backend::DuckDbBackend;
pub use error::StoreError;
pub use memory::MemoryBackend;
pub use rebuild::{ContentResolver, RebuildOutcome, rebuild_stale};
pub use store::{HealthStats, VectorStore};

/// Open a store with the backend named in the configuration
/// (`duckdb` with its `db_path`, or `memory`).
///
/// # Errors
///
/// Returns [`StoreError::InvalidInput`] for an unknown backend name,
/// [`StoreError`] storage variants when the database cannot be opened.
pub fn open_store(
    config: &EngramConfig,
    embedder: Arc<dyn Embedder>,
) -> Result<VectorStore, StoreError> {
    let backend: Arc<dyn VectorBackend> = match config.store.backend.as_str() {
        "duckdb" => {
            let dimensions = embedder.dimensions();
            if config.store.db_path == ":memory:" {
                Arc::new(DuckDbBackend::open_in_memory(dimensions)?)
            } else {
                let path = Path::new(&config.store.db_path);
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            StoreError::BackendState(format!(
                                "create {}: {e}",
                                parent.display()
                            ))
                        })?;
                    }
                }
                Arc::new(DuckDbBackend::open(path, dimensions)?)
            }
        }
        "memory" => Arc::new(MemoryBackend::new()),
        other => {
            return Err(StoreError::InvalidInput(format!(
                "unknown store backend '{other}'"
            )));
        }
    };
    Ok(VectorStore::new(backend, embedder, &config.cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_embed::HashEmbedder;

    #[test]
    fn open_store_honors_backend_selection() {
        let mut config = EngramConfig::default();
        config.store.backend = "memory".to_string();
        let store = open_store(&config, Arc::new(HashEmbedder::new(64))).unwrap();
        assert_eq!(store.count().unwrap(), 0);

        config.store.backend = "duckdb".to_string();
        config.store.db_path = ":memory:".to_string();
        let store = open_store(&config, Arc::new(HashEmbedder::new(64))).unwrap();
        assert_eq!(store.count().unwrap(), 0);

        config.store.backend = "paper".to_string();
        assert!(open_store(&config, Arc::new(HashEmbedder::new(64))).is_err());
    }
}
