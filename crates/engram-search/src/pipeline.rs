//! The retrieval pipeline: expand → per-variant vector search → union +
//! dedup → optional cross-encoder rerank.
//!
//! Variant similarity is scaled by expansion weight; when multiple
//! variants surface the same document, the best weighted score wins.

use std::collections::HashMap;
use std::sync::Arc;

use engram_core::QueryResult;
use engram_store::{QueryFilter, VectorStore};
use serde::Serialize;
use tracing::debug;

use crate::error::SearchError;
use crate::expand::QueryExpander;
use crate::rerank::{RerankCandidate, RerankResult, Reranker};

/// Default final result count when the caller passes `k <= 0`.
const DEFAULT_K: i64 = 10;

/// A retrieval hit with its expansion-weighted score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub result: QueryResult,
    /// `expansion_weight × similarity`, best across matching variants.
    pub score: f64,
    /// Source tag of the variant that produced the best score.
    pub matched_variant: String,
}

/// Composes the expander and the vector store into hybrid retrieval.
pub struct Retriever {
    store: Arc<VectorStore>,
    expander: QueryExpander,
}

impl Retriever {
    #[must_use]
    pub const fn new(store: Arc<VectorStore>, expander: QueryExpander) -> Self {
        Self { store, expander }
    }

    /// Expanded, deduplicated top-k retrieval.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidQuery`] for empty queries and store
    /// errors otherwise.
    pub fn search(
        &self,
        query: &str,
        k: i64,
        filter: &QueryFilter,
    ) -> Result<Vec<RetrievalHit>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery("query text is empty".to_string()));
        }
        let k = if k > 0 { k } else { DEFAULT_K };

        let expansions = self.expander.expand(query);
        debug!(variants = expansions.len(), "query expanded");

        let mut best: HashMap<String, RetrievalHit> = HashMap::new();
        for expansion in &expansions {
            let results = self.store.query(&expansion.text, k, filter)?;
            for result in results {
                let score = f64::from(expansion.weight) * result.similarity;
                match best.entry(result.id.clone()) {
                    std::collections::hash_map::Entry::Occupied(mut slot) => {
                        if score > slot.get().score {
                            *slot.get_mut() = RetrievalHit {
                                result,
                                score,
                                matched_variant: expansion.source.clone(),
                            };
                        }
                    }
                    std::collections::hash_map::Entry::Vacant(slot) => {
                        slot.insert(RetrievalHit {
                            result,
                            score,
                            matched_variant: expansion.source.clone(),
                        });
                    }
                }
            }
        }

        let mut hits: Vec<RetrievalHit> = best.into_values().collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.result.id.cmp(&b.result.id))
        });
        #[allow(clippy::cast_sign_loss)]
        hits.truncate(k as usize);
        Ok(hits)
    }

    /// [`Self::search`] followed by cross-encoder reranking.
    ///
    /// The vector store holds no document text, so the caller supplies
    /// `resolve_content` (backed by the relational store). Hits whose
    /// content cannot be resolved keep their bi-encoder ordering at the
    /// tail of the result.
    ///
    /// # Errors
    ///
    /// Same as [`Self::search`], plus [`SearchError::Rerank`] when the
    /// cross-encoder fails.
    pub fn search_reranked<F>(
        &self,
        reranker: &Reranker,
        query: &str,
        k: i64,
        filter: &QueryFilter,
        resolve_content: F,
    ) -> Result<Vec<RerankResult>, SearchError>
    where
        F: Fn(&QueryResult) -> Option<String>,
    {
        let hits = self.search(query, k, filter)?;

        let mut candidates = Vec::with_capacity(hits.len());
        let mut unresolved = Vec::new();
        for hit in hits {
            if let Some(content) = resolve_content(&hit.result) {
                candidates.push(RerankCandidate {
                    id: hit.result.id.clone(),
                    content,
                    score: hit.score,
                    metadata: serde_json::to_value(&hit.result.metadata)
                        .unwrap_or(serde_json::Value::Null),
                });
            } else {
                unresolved.push(hit);
            }
        }
        if !unresolved.is_empty() {
            debug!(count = unresolved.len(), "hits without resolvable content skipped rerank");
        }

        let mut results = reranker.rerank(query, &candidates, k)?;

        // Content-less hits trail the reranked block in bi-encoder order.
        let mut next_rank = results.len();
        for hit in unresolved {
            next_rank += 1;
            results.push(RerankResult {
                id: hit.result.id,
                content: String::new(),
                combined_score: hit.score,
                cross_score: 0.0,
                prior_score: hit.score,
                rerank_rank: next_rank,
                rank_improvement: 0,
                metadata: serde_json::Value::Null,
            });
        }
        #[allow(clippy::cast_sign_loss)]
        let k = if k > 0 { k as usize } else { DEFAULT_K as usize };
        results.truncate(k);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::QueryExpander;
    use crate::rerank::PairScorer;
    use engram_config::{CacheConfig, ExpansionConfig};
    use engram_core::{DocMetadata, DocType, Document};
    use engram_embed::HashEmbedder;
    use engram_store::MemoryBackend;
    use pretty_assertions::assert_eq;

    fn test_store() -> Arc<VectorStore> {
        Arc::new(VectorStore::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(HashEmbedder::new(256)),
            &CacheConfig::default(),
        ))
    }

    fn doc(doc_id: &str, sqlite_id: i64, content: &str, project: Option<&str>) -> Document {
        let mut metadata = DocMetadata::new(sqlite_id, DocType::Observation);
        metadata.project = project.map(ToString::to_string);
        if project.is_some() {
            metadata.scope = engram_core::Scope::Project;
        }
        Document {
            doc_id: doc_id.to_string(),
            content: content.to_string(),
            metadata,
        }
    }

    fn retriever(store: Arc<VectorStore>) -> Retriever {
        Retriever::new(
            store,
            QueryExpander::new(ExpansionConfig {
                enable_vocabulary_expansion: false,
                ..Default::default()
            }),
        )
    }

    #[test]
    fn ingest_then_search_ranks_the_relevant_observation_first() {
        let store = test_store();
        store
            .add_documents(&[
                doc(
                    "obs_1_narrative",
                    1,
                    "Fixed JWT validation to handle expired tokens",
                    Some("P"),
                ),
                doc("obs_2_narrative", 2, "Dark mode toggle for settings", Some("P")),
            ])
            .unwrap();

        let filter = QueryFilter {
            doc_type: None,
            project: Some("P".to_string()),
        };
        let hits = retriever(store).search("jwt token expired", 3, &filter).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].result.id, "obs_1_narrative");
        assert_eq!(hits[0].matched_variant, "original");
    }

    #[test]
    fn variants_union_and_dedup_keeps_best_score() {
        let store = test_store();
        store
            .add_documents(&[doc(
                "obs_1_narrative",
                1,
                "implement authentication with session cookies",
                None,
            )])
            .unwrap();

        // A question query fans out into declarative and how-variants, all
        // of which hit the same document; it must appear exactly once.
        let hits = retriever(store)
            .search("how do I implement authentication", 5, &QueryFilter::default())
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].result.id, "obs_1_narrative");
        // The winning score can only come from a weight≤1 variant.
        assert!(hits[0].score <= 1.0);
    }

    #[test]
    fn empty_query_is_invalid() {
        let store = test_store();
        assert!(matches!(
            retriever(store).search("  ", 5, &QueryFilter::default()).unwrap_err(),
            SearchError::InvalidQuery(_)
        ));
    }

    #[test]
    fn reranked_search_consults_resolved_content() {
        struct ContainsScorer;
        impl PairScorer for ContainsScorer {
            fn score_pairs(
                &self,
                query: &str,
                documents: &[String],
            ) -> Result<Vec<f64>, SearchError> {
                let needle = query.to_lowercase();
                Ok(documents
                    .iter()
                    .map(|d| {
                        if d.to_lowercase().contains(needle.split_whitespace().next().unwrap_or(""))
                        {
                            5.0
                        } else {
                            -5.0
                        }
                    })
                    .collect())
            }
        }

        let store = test_store();
        store
            .add_documents(&[
                doc("obs_1_narrative", 1, "goroutine error propagation", None),
                doc("obs_2_narrative", 2, "errors bubble up with question mark", None),
            ])
            .unwrap();

        let contents: HashMap<&str, &str> = HashMap::from([
            ("obs_1_narrative", "goroutine error propagation"),
            ("obs_2_narrative", "errors bubble up with question mark"),
        ]);

        let reranker = Reranker::new(Box::new(ContainsScorer), 0.7);
        let results = retriever(store)
            .search_reranked(
                &reranker,
                "goroutine panics",
                5,
                &QueryFilter::default(),
                |r| contents.get(r.id.as_str()).map(ToString::to_string),
            )
            .unwrap();

        assert_eq!(results[0].id, "obs_1_narrative");
        assert_eq!(results[0].rerank_rank, 1);
    }
}
