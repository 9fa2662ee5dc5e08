//! The vector store facade: embedding-backed ingest, cached filtered
//! search, staleness tracking, and health reporting.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use engram_config::CacheConfig;
use engram_core::{Document, QueryResult, StaleVector, VectorRow, ids};
use engram_embed::Embedder;
use serde::Serialize;
use tracing::debug;

use crate::backend::{QueryFilter, VectorBackend};
use crate::cache::{CacheStatsSnapshot, EmbeddingCache, ResultCache};
use crate::error::StoreError;

/// Default top-k when the caller passes `k <= 0`.
const DEFAULT_K: usize = 10;

/// Aggregate store health, shaped for the `health` command's JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStats {
    pub total: u64,
    pub stale: u64,
    pub coverage_by_type: BTreeMap<String, u64>,
    pub model_versions: BTreeMap<String, u64>,
    pub project_counts: BTreeMap<String, u64>,
    pub current_model: String,
    pub needs_rebuild: bool,
    pub rebuild_reason: Option<String>,
    pub embedding_cache: CacheStatsSnapshot,
    pub result_cache: CacheStatsSnapshot,
}

/// Vector store facade over a pluggable backend.
///
/// Writes are serialized under the write half of an `RwLock`; the result
/// cache is invalidated inside that critical section so a subsequent
/// reader can never observe pre-write cache entries. Reads take the read
/// half and are serializable with respect to writes.
pub struct VectorStore {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn Embedder>,
    embedding_cache: Arc<EmbeddingCache>,
    result_cache: Arc<ResultCache>,
    rw: RwLock<()>,
}

impl VectorStore {
    #[must_use]
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        embedder: Arc<dyn Embedder>,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            backend,
            embedder,
            embedding_cache: Arc::new(EmbeddingCache::new(
                cache_config.embedding_capacity,
                Duration::from_secs(cache_config.embedding_ttl_secs),
            )),
            result_cache: Arc::new(ResultCache::new(
                cache_config.result_capacity,
                Duration::from_secs(cache_config.result_ttl_secs),
            )),
            rw: RwLock::new(()),
        }
    }

    /// Upsert documents by `doc_id`.
    ///
    /// Non-empty contents are embedded in a single batch; documents with
    /// empty content are skipped entirely; empty text is never indexed.
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Embed`] when the batch cannot be embedded,
    /// [`StoreError`] storage variants when the upsert fails.
    pub fn add_documents(&self, docs: &[Document]) -> Result<usize, StoreError> {
        let live: Vec<&Document> = docs
            .iter()
            .filter(|d| {
                let keep = !d.content.trim().is_empty();
                if !keep {
                    debug!(doc_id = %d.doc_id, "skipping empty document");
                }
                keep
            })
            .collect();
        if live.is_empty() {
            return Ok(0);
        }

        let contents: Vec<String> = live.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&contents)?;
        let version = self.embedder.version().to_string();

        let rows: Vec<VectorRow> = live
            .iter()
            .zip(embeddings)
            .map(|(doc, embedding)| VectorRow {
                doc_id: doc.doc_id.clone(),
                embedding,
                metadata: doc.metadata.clone(),
                model_version: version.clone(),
            })
            .collect();

        let _write = self.rw.write().unwrap_or_else(PoisonError::into_inner);
        self.backend.upsert(&rows)?;
        self.result_cache.invalidate();
        Ok(rows.len())
    }

    /// Delete by exact `doc_id`; idempotent, missing ids are fine.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] storage variants on backend failure.
    pub fn delete_documents(&self, doc_ids: &[String]) -> Result<usize, StoreError> {
        if doc_ids.is_empty() {
            return Ok(0);
        }
        let _write = self.rw.write().unwrap_or_else(PoisonError::into_inner);
        let removed = self.backend.delete(doc_ids)?;
        self.result_cache.invalidate();
        Ok(removed)
    }

    /// Remove every vector derived from observation `obs_id`
    /// (`obs_{id}_*`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] storage variants on backend failure.
    pub fn delete_by_observation_id(&self, obs_id: i64) -> Result<usize, StoreError> {
        let prefix = ids::observation_prefix(obs_id);
        let _write = self.rw.write().unwrap_or_else(PoisonError::into_inner);
        let removed = self.backend.delete_by_prefix(&prefix)?;
        self.result_cache.invalidate();
        Ok(removed)
    }

    /// Granular-rebuild deletion path. Unlike [`Self::delete_documents`],
    /// an empty id list here is a caller bug.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] on an empty list.
    pub fn delete_vectors_by_doc_ids(&self, doc_ids: &[String]) -> Result<usize, StoreError> {
        if doc_ids.is_empty() {
            return Err(StoreError::InvalidInput(
                "doc id list must be non-empty".to_string(),
            ));
        }
        self.delete_documents(doc_ids)
    }

    /// Filtered top-k by cosine distance.
    ///
    /// `k <= 0` defaults to 10. Results satisfy
    /// `similarity = 1 − distance/2` exactly and are defensive copies, so
    /// mutating them cannot corrupt the cache.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] for empty query text,
    /// [`StoreError::Embed`] / storage variants otherwise.
    pub fn query(
        &self,
        text: &str,
        k: i64,
        filter: &QueryFilter,
    ) -> Result<Vec<QueryResult>, StoreError> {
        let k = usize::try_from(k).ok().filter(|k| *k > 0).unwrap_or(DEFAULT_K);
        if text.trim().is_empty() {
            return Err(StoreError::InvalidInput("query text is empty".to_string()));
        }

        let key = ResultCache::fingerprint(text, k, filter);
        if let Some(cached) = self.result_cache.get(&key) {
            return Ok(cached);
        }

        let _read = self.rw.read().unwrap_or_else(PoisonError::into_inner);
        let embedder = Arc::clone(&self.embedder);
        let embedding = self
            .embedding_cache
            .get_or_compute(text, move || embedder.embed(text).map_err(Into::into))?;

        let hits = self.backend.top_k(&embedding, k, filter)?;
        let results: Vec<QueryResult> = hits
            .into_iter()
            .map(|hit| QueryResult::from_distance(hit.doc_id, hit.distance, hit.metadata))
            .collect();

        self.result_cache.insert(key, results.clone());
        Ok(results)
    }

    /// [`Self::query`] with a raw `where` map; unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Same as [`Self::query`].
    pub fn query_where(
        &self,
        text: &str,
        k: i64,
        where_map: &HashMap<String, String>,
    ) -> Result<Vec<QueryResult>, StoreError> {
        self.query(text, k, &QueryFilter::from_where(where_map))
    }

    /// Best-scoring row per `sqlite_id` (ranked partition, top-1 per
    /// group). Bypasses the result cache; multi-field consumers rank
    /// and rescore downstream.
    ///
    /// # Errors
    ///
    /// Same as [`Self::query`].
    pub fn query_multi_field(
        &self,
        text: &str,
        k: i64,
        filter: &QueryFilter,
    ) -> Result<Vec<QueryResult>, StoreError> {
        let k = usize::try_from(k).ok().filter(|k| *k > 0).unwrap_or(DEFAULT_K);
        if text.trim().is_empty() {
            return Err(StoreError::InvalidInput("query text is empty".to_string()));
        }

        let _read = self.rw.read().unwrap_or_else(PoisonError::into_inner);
        let embedder = Arc::clone(&self.embedder);
        let embedding = self
            .embedding_cache
            .get_or_compute(text, move || embedder.embed(text).map_err(Into::into))?;

        let hits = self.backend.top_k_grouped(&embedding, k, filter)?;
        Ok(hits
            .into_iter()
            .map(|hit| QueryResult::from_distance(hit.doc_id, hit.distance, hit.metadata))
            .collect())
    }

    /// Total vector rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] storage variants on backend failure.
    pub fn count(&self) -> Result<u64, StoreError> {
        let _read = self.rw.read().unwrap_or_else(PoisonError::into_inner);
        self.backend.count()
    }

    /// Version string of the active embedding model.
    #[must_use]
    pub fn model_version(&self) -> &str {
        self.embedder.version()
    }

    /// Whether the index must be rebuilt, and why: `"empty"` or
    /// `"model_mismatch:N"` with N the stale row count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] storage variants on backend failure.
    pub fn needs_rebuild(&self) -> Result<(bool, Option<String>), StoreError> {
        let _read = self.rw.read().unwrap_or_else(PoisonError::into_inner);
        if self.backend.count()? == 0 {
            return Ok((true, Some("empty".to_string())));
        }
        let stale = self.backend.stale(self.embedder.version())?.len();
        if stale > 0 {
            return Ok((true, Some(format!("model_mismatch:{stale}"))));
        }
        Ok((false, None))
    }

    /// Descriptors of rows embedded by a non-current model, for the
    /// granular rebuild loop.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] storage variants on backend failure.
    pub fn get_stale_vectors(&self) -> Result<Vec<StaleVector>, StoreError> {
        let _read = self.rw.read().unwrap_or_else(PoisonError::into_inner);
        self.backend.stale(self.embedder.version())
    }

    /// Aggregate health report.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] storage variants on backend failure.
    pub fn get_health_stats(&self) -> Result<HealthStats, StoreError> {
        let _read = self.rw.read().unwrap_or_else(PoisonError::into_inner);
        let total = self.backend.count()?;
        let stale = self.backend.stale(self.embedder.version())?.len() as u64;
        let (needs_rebuild, rebuild_reason) = if total == 0 {
            (true, Some("empty".to_string()))
        } else if stale > 0 {
            (true, Some(format!("model_mismatch:{stale}")))
        } else {
            (false, None)
        };
        Ok(HealthStats {
            total,
            stale,
            coverage_by_type: self.backend.coverage_by_type()?,
            model_versions: self.backend.version_counts()?,
            project_counts: self.backend.project_counts()?,
            current_model: self.embedder.version().to_string(),
            needs_rebuild,
            rebuild_reason,
            embedding_cache: self.embedding_cache.stats(),
            result_cache: self.result_cache.stats(),
        })
    }

    /// The embedding cache, for the background cleaner.
    #[must_use]
    pub fn embedding_cache(&self) -> Arc<EmbeddingCache> {
        Arc::clone(&self.embedding_cache)
    }

    /// The result cache, for the background cleaner.
    #[must_use]
    pub fn result_cache(&self) -> Arc<ResultCache> {
        Arc::clone(&self.result_cache)
    }

    /// The active embedder (shared with search-side consumers).
    #[must_use]
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use engram_core::{DocMetadata, DocType};
    use engram_embed::HashEmbedder;
    use pretty_assertions::assert_eq;

    fn test_store() -> VectorStore {
        VectorStore::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(HashEmbedder::new(128)),
            &CacheConfig::default(),
        )
    }

    fn doc(doc_id: &str, sqlite_id: i64, content: &str) -> Document {
        Document {
            doc_id: doc_id.to_string(),
            content: content.to_string(),
            metadata: DocMetadata::new(sqlite_id, DocType::Observation),
        }
    }

    #[test]
    fn round_trip_rank_one_with_high_similarity() {
        let store = test_store();
        store
            .add_documents(&[
                doc("obs_1_narrative", 1, "Fixed JWT validation to handle expired tokens"),
                doc("obs_2_narrative", 2, "Added dark mode toggle to settings page"),
            ])
            .unwrap();

        let results = store
            .query(
                "Fixed JWT validation to handle expired tokens",
                1,
                &QueryFilter::default(),
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "obs_1_narrative");
        assert!(results[0].similarity >= 0.9, "similarity {}", results[0].similarity);
        // The invariant holds exactly.
        assert!(
            (results[0].similarity - (1.0 - results[0].distance / 2.0)).abs() < 1e-12
        );
    }

    #[test]
    fn empty_documents_are_never_indexed() {
        let store = test_store();
        let written = store
            .add_documents(&[doc("a", 1, ""), doc("b", 2, "   "), doc("c", 3, "real content")])
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn upsert_keeps_latest_content() {
        let store = test_store();
        store.add_documents(&[doc("a", 1, "first version")]).unwrap();
        store.add_documents(&[doc("a", 1, "second version entirely")]).unwrap();
        assert_eq!(store.count().unwrap(), 1);

        let results = store
            .query("second version entirely", 1, &QueryFilter::default())
            .unwrap();
        assert!(results[0].similarity >= 0.9);
    }

    #[test]
    fn delete_documents_is_idempotent() {
        let store = test_store();
        store.add_documents(&[doc("a", 1, "content here")]).unwrap();
        assert_eq!(
            store
                .delete_documents(&["a".to_string(), "a".to_string()])
                .unwrap(),
            1
        );
        assert_eq!(store.delete_documents(&["ghost".to_string()]).unwrap(), 0);
        assert_eq!(store.delete_documents(&[]).unwrap(), 0);
    }

    #[test]
    fn delete_vectors_requires_non_empty_ids() {
        let store = test_store();
        assert!(matches!(
            store.delete_vectors_by_doc_ids(&[]).unwrap_err(),
            StoreError::InvalidInput(_)
        ));
    }

    #[test]
    fn observation_cascade_delete_removes_all_fields() {
        let store = test_store();
        store
            .add_documents(&[
                doc("obs_7_narrative", 7, "narrative text"),
                doc("obs_7_fact_0", 7, "first fact"),
                doc("obs_7_fact_1", 7, "second fact"),
                doc("obs_71_narrative", 71, "unrelated observation"),
            ])
            .unwrap();

        assert_eq!(store.delete_by_observation_id(7).unwrap(), 3);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn query_after_write_never_serves_stale_cache() {
        let store = test_store();
        store.add_documents(&[doc("a", 1, "jwt token handling")]).unwrap();

        let before = store.query("jwt token", 5, &QueryFilter::default()).unwrap();
        assert_eq!(before.len(), 1);

        store.add_documents(&[doc("b", 2, "jwt token expiry")]).unwrap();
        let after = store.query("jwt token", 5, &QueryFilter::default()).unwrap();
        assert_eq!(after.len(), 2, "result cache must be invalidated by the write");
    }

    #[test]
    fn k_defaults_to_ten_when_non_positive() {
        let store = test_store();
        let docs: Vec<Document> = (0..15)
            .map(|i| doc(&format!("obs_{i}_narrative"), i, &format!("shared topic variant {i}")))
            .collect();
        store.add_documents(&docs).unwrap();

        let results = store.query("shared topic", 0, &QueryFilter::default()).unwrap();
        assert_eq!(results.len(), 10);
        let results = store.query("shared topic", -3, &QueryFilter::default()).unwrap();
        assert_eq!(results.len(), 10);
    }

    #[test]
    fn empty_query_text_is_invalid_input() {
        let store = test_store();
        assert!(matches!(
            store.query("  ", 5, &QueryFilter::default()).unwrap_err(),
            StoreError::InvalidInput(_)
        ));
    }

    #[test]
    fn needs_rebuild_reports_empty_then_clean() {
        let store = test_store();
        assert_eq!(store.needs_rebuild().unwrap(), (true, Some("empty".to_string())));

        store.add_documents(&[doc("a", 1, "content")]).unwrap();
        assert_eq!(store.needs_rebuild().unwrap(), (false, None));
    }

    #[test]
    fn model_rotation_reports_mismatch_count() {
        // Two stores share one backend; the second runs a different
        // model version, as after a config change.
        let backend: Arc<dyn VectorBackend> = Arc::new(MemoryBackend::new());
        let v1 = VectorStore::new(
            Arc::clone(&backend),
            Arc::new(HashEmbedder::new(128)),
            &CacheConfig::default(),
        );
        v1.add_documents(&[doc("a", 1, "one"), doc("b", 2, "two")]).unwrap();

        struct RenamedHash(HashEmbedder);
        impl Embedder for RenamedHash {
            fn name(&self) -> &str {
                self.0.name()
            }
            fn version(&self) -> &str {
                "hash-v2"
            }
            fn dimensions(&self) -> usize {
                self.0.dimensions()
            }
            fn embed(&self, text: &str) -> Result<Vec<f32>, engram_embed::EmbedError> {
                self.0.embed(text)
            }
            fn embed_batch(
                &self,
                texts: &[String],
            ) -> Result<Vec<Vec<f32>>, engram_embed::EmbedError> {
                self.0.embed_batch(texts)
            }
            fn close(&self) {
                self.0.close();
            }
        }

        let v2 = VectorStore::new(
            backend,
            Arc::new(RenamedHash(HashEmbedder::new(128))),
            &CacheConfig::default(),
        );
        let (needs, reason) = v2.needs_rebuild().unwrap();
        assert!(needs);
        assert_eq!(reason.as_deref(), Some("model_mismatch:2"));
        assert_eq!(v2.get_stale_vectors().unwrap().len(), 2);
    }

    #[test]
    fn health_stats_cover_the_whole_surface() {
        let store = test_store();
        let mut project_doc = doc("obs_1_narrative", 1, "project scoped");
        project_doc.metadata.project = Some("engram".to_string());
        let mut prompt_doc = doc("prompt_2", 2, "what did we decide about retries");
        prompt_doc.metadata.doc_type = DocType::UserPrompt;
        store.add_documents(&[project_doc, prompt_doc]).unwrap();

        let health = store.get_health_stats().unwrap();
        assert_eq!(health.total, 2);
        assert_eq!(health.stale, 0);
        assert_eq!(health.coverage_by_type["observation"], 1);
        assert_eq!(health.coverage_by_type["user_prompt"], 1);
        assert_eq!(health.model_versions["hash-v1"], 2);
        assert_eq!(health.project_counts["engram"], 1);
        assert_eq!(health.current_model, "hash-v1");
        assert!(!health.needs_rebuild);
    }

    #[test]
    fn multi_field_query_collapses_to_best_per_source() {
        let store = test_store();
        store
            .add_documents(&[
                doc("obs_1_narrative", 1, "jwt expiry bug in validation"),
                doc("obs_1_fact_0", 1, "jwt exp claim ignored"),
                doc("obs_2_narrative", 2, "css grid layout"),
            ])
            .unwrap();

        let results = store
            .query_multi_field("jwt expiry", 10, &QueryFilter::default())
            .unwrap();
        let from_one: Vec<&str> = results
            .iter()
            .filter(|r| r.metadata.sqlite_id == 1)
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(from_one.len(), 1, "one row per sqlite_id");
    }
}
