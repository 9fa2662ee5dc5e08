//! Granular index rebuild.
//!
//! When the active embedding model changes, existing rows keep their old
//! `model_version` and are reported stale. The rebuild loop walks the
//! stale set in batches: the ingest layer re-formats each source's
//! content (it owns the relational store, so it is a seam here), the
//! stale rows are deleted, and fresh documents are re-embedded and
//! re-added under the current version.

use engram_core::{DocMetadata, Document, StaleVector};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::VectorStore;

/// Resolves a stale vector descriptor back to ingestable content.
///
/// Implemented by the ingest layer over the relational store. Returning
/// `None` means the source row no longer exists; its vector is deleted
/// and not replaced.
pub trait ContentResolver: Send + Sync {
    fn resolve(&self, stale: &StaleVector) -> Option<String>;
}

/// Aggregate outcome of one rebuild run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RebuildOutcome {
    /// Stale rows found at the start of the run.
    pub stale: usize,
    /// Rows re-embedded under the current model version.
    pub rebuilt: usize,
    /// Rows whose source is gone; deleted without replacement.
    pub orphaned: usize,
    /// Rows that failed to re-embed; their stale vectors were already
    /// deleted and will reappear on the next ingest pass.
    pub failed: usize,
}

/// Batch size for delete + re-add passes.
const REBUILD_BATCH: usize = 64;

/// Rebuild every stale vector through `resolver`.
///
/// Each batch is deleted before its replacements are added, so a crash
/// mid-run leaves missing rows (repairable by re-ingest) rather than
/// stale ones.
///
/// # Errors
///
/// Returns [`StoreError`] when the stale scan or a delete fails; per-row
/// embedding failures are counted, logged, and skipped.
pub fn rebuild_stale(
    store: &VectorStore,
    resolver: &dyn ContentResolver,
) -> Result<RebuildOutcome, StoreError> {
    let stale = store.get_stale_vectors()?;
    let mut outcome = RebuildOutcome {
        stale: stale.len(),
        ..RebuildOutcome::default()
    };
    if stale.is_empty() {
        return Ok(outcome);
    }
    info!(stale = stale.len(), "rebuilding stale vectors");

    for batch in stale.chunks(REBUILD_BATCH) {
        let doc_ids: Vec<String> = batch.iter().map(|s| s.doc_id.clone()).collect();

        let mut docs = Vec::with_capacity(batch.len());
        for descriptor in batch {
            match resolver.resolve(descriptor) {
                Some(content) => {
                    let mut metadata =
                        DocMetadata::new(descriptor.sqlite_id, descriptor.doc_type);
                    metadata.field_type = descriptor.field_type.clone();
                    metadata.project = descriptor.project.clone();
                    metadata.scope = descriptor.scope;
                    docs.push(Document {
                        doc_id: descriptor.doc_id.clone(),
                        content,
                        metadata,
                    });
                }
                None => {
                    debug!(doc_id = %descriptor.doc_id, "source row gone, dropping vector");
                    outcome.orphaned += 1;
                }
            }
        }

        store.delete_vectors_by_doc_ids(&doc_ids)?;
        match store.add_documents(&docs) {
            Ok(written) => outcome.rebuilt += written,
            Err(err) => {
                warn!(error = %err, batch = docs.len(), "rebuild batch failed to re-embed");
                outcome.failed += docs.len();
            }
        }
    }

    info!(
        rebuilt = outcome.rebuilt,
        orphaned = outcome.orphaned,
        failed = outcome.failed,
        "rebuild complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VectorBackend;
    use crate::memory::MemoryBackend;
    use engram_config::CacheConfig;
    use engram_core::{DocType, VectorRow};
    use engram_embed::HashEmbedder;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MapResolver(HashMap<String, String>);

    impl ContentResolver for MapResolver {
        fn resolve(&self, stale: &StaleVector) -> Option<String> {
            self.0.get(&stale.doc_id).cloned()
        }
    }

    /// Seed rows under an old model version directly at the backend.
    fn seed_stale(backend: &MemoryBackend, doc_id: &str, sqlite_id: i64) {
        backend
            .upsert(&[VectorRow {
                doc_id: doc_id.to_string(),
                embedding: vec![1.0; 64],
                metadata: DocMetadata::new(sqlite_id, DocType::Observation),
                model_version: "hash-v0".to_string(),
            }])
            .unwrap();
    }

    #[test]
    fn rebuild_replaces_stale_rows_under_the_current_version() {
        let backend = Arc::new(MemoryBackend::new());
        seed_stale(&backend, "obs_1_narrative", 1);
        seed_stale(&backend, "obs_2_narrative", 2);

        let store = VectorStore::new(
            Arc::clone(&backend) as Arc<dyn VectorBackend>,
            Arc::new(HashEmbedder::new(64)),
            &CacheConfig::default(),
        );
        let resolver = MapResolver(HashMap::from([
            ("obs_1_narrative".to_string(), "fresh content one".to_string()),
            ("obs_2_narrative".to_string(), "fresh content two".to_string()),
        ]));

        let outcome = rebuild_stale(&store, &resolver).unwrap();
        assert_eq!(
            outcome,
            RebuildOutcome {
                stale: 2,
                rebuilt: 2,
                orphaned: 0,
                failed: 0
            }
        );
        assert_eq!(store.needs_rebuild().unwrap(), (false, None));
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn orphaned_sources_are_deleted_without_replacement() {
        let backend = Arc::new(MemoryBackend::new());
        seed_stale(&backend, "obs_1_narrative", 1);
        seed_stale(&backend, "obs_9_narrative", 9);

        let store = VectorStore::new(
            Arc::clone(&backend) as Arc<dyn VectorBackend>,
            Arc::new(HashEmbedder::new(64)),
            &CacheConfig::default(),
        );
        let resolver = MapResolver(HashMap::from([(
            "obs_1_narrative".to_string(),
            "still alive".to_string(),
        )]));

        let outcome = rebuild_stale(&store, &resolver).unwrap();
        assert_eq!(outcome.rebuilt, 1);
        assert_eq!(outcome.orphaned, 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn clean_index_is_a_no_op() {
        let store = VectorStore::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(HashEmbedder::new(64)),
            &CacheConfig::default(),
        );
        let resolver = MapResolver(HashMap::new());
        let outcome = rebuild_stale(&store, &resolver).unwrap();
        assert_eq!(outcome, RebuildOutcome::default());
    }
}
