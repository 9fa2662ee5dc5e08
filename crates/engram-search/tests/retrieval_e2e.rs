//! Retrieval pipeline end-to-end: expansion fan-out over a populated
//! store, deduplication, scoring, and a full rerank pass.

use std::collections::HashMap;
use std::sync::Arc;

use engram_config::{CacheConfig, ExpansionConfig, ScoringConfig};
use engram_core::{DocMetadata, DocType, Document, Observation, ObservationType};
use engram_embed::HashEmbedder;
use engram_search::{
    PairScorer, QueryExpander, RelevanceInputs, Reranker, Retriever, SearchError, importance,
    relevance,
};
use engram_store::{MemoryBackend, QueryFilter, VectorStore};
use pretty_assertions::assert_eq;

fn store_with(docs: &[(&str, i64, &str)]) -> Arc<VectorStore> {
    let store = VectorStore::new(
        Arc::new(MemoryBackend::new()),
        Arc::new(HashEmbedder::new(256)),
        &CacheConfig::default(),
    );
    let documents: Vec<Document> = docs
        .iter()
        .map(|(doc_id, sqlite_id, content)| Document {
            doc_id: (*doc_id).to_string(),
            content: (*content).to_string(),
            metadata: DocMetadata::new(*sqlite_id, DocType::Observation),
        })
        .collect();
    store.add_documents(&documents).unwrap();
    Arc::new(store)
}

#[test]
fn question_query_finds_docs_through_its_variants() {
    let store = store_with(&[
        ("obs_1_narrative", 1, "implement authentication middleware for the api"),
        ("obs_2_narrative", 2, "database connection pool sizing"),
    ]);
    let retriever = Retriever::new(
        Arc::clone(&store),
        QueryExpander::new(ExpansionConfig {
            enable_vocabulary_expansion: false,
            ..Default::default()
        }),
    );

    let hits = retriever
        .search("how do I implement authentication", 5, &QueryFilter::default())
        .unwrap();
    assert_eq!(hits[0].result.id, "obs_1_narrative");
    // Each doc id appears once even though three variants matched it.
    let mut doc_ids: Vec<&str> = hits.iter().map(|h| h.result.id.as_str()).collect();
    doc_ids.sort_unstable();
    doc_ids.dedup();
    assert_eq!(doc_ids.len(), hits.len());
}

#[test]
fn weighted_scores_never_exceed_the_original_similarity_bound() {
    let store = store_with(&[("obs_1_narrative", 1, "panic in the retry handler")]);
    let retriever = Retriever::new(
        Arc::clone(&store),
        QueryExpander::new(ExpansionConfig {
            enable_vocabulary_expansion: false,
            ..Default::default()
        }),
    );

    let hits = retriever
        .search("fix panic in retry handler", 5, &QueryFilter::default())
        .unwrap();
    for hit in &hits {
        assert!(hit.score <= 1.0 + f64::EPSILON);
        assert!(hit.score >= -1.0);
    }
}

#[test]
fn full_pass_search_then_rerank_then_score() {
    struct OverlapScorer;
    impl PairScorer for OverlapScorer {
        fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<f64>, SearchError> {
            let terms: Vec<String> = query
                .to_lowercase()
                .split_whitespace()
                .map(ToString::to_string)
                .collect();
            #[allow(clippy::cast_precision_loss)]
            Ok(documents
                .iter()
                .map(|doc| {
                    let doc = doc.to_lowercase();
                    terms.iter().filter(|t| doc.contains(t.as_str())).count() as f64 - 1.0
                })
                .collect())
        }
    }

    let store = store_with(&[
        ("obs_1_narrative", 1, "jwt expiry bug fixed in validation"),
        ("obs_2_narrative", 2, "jwt library upgrade notes"),
    ]);
    let retriever = Retriever::new(
        Arc::clone(&store),
        QueryExpander::new(ExpansionConfig {
            enable_vocabulary_expansion: false,
            ..Default::default()
        }),
    );
    let contents: HashMap<&str, &str> = HashMap::from([
        ("obs_1_narrative", "jwt expiry bug fixed in validation"),
        ("obs_2_narrative", "jwt library upgrade notes"),
    ]);
    let reranker = Reranker::new(Box::new(OverlapScorer), 0.7);

    let results = retriever
        .search_reranked(
            &reranker,
            "jwt expiry validation",
            5,
            &QueryFilter::default(),
            |r| contents.get(r.id.as_str()).map(ToString::to_string),
        )
        .unwrap();

    assert_eq!(results[0].id, "obs_1_narrative");
    assert_eq!(results[0].rerank_rank, 1);
    assert!(results[0].combined_score > results[1].combined_score);

    // Downstream relevance ranking uses the stored importance.
    let now = 1_750_000_000_000;
    let mut observation = Observation::new(1, ObservationType::Bugfix);
    observation.created_at_epoch = now;
    let importance_score = importance(&observation, now, &ScoringConfig::default());
    let score = relevance(
        &RelevanceInputs {
            age_days: 0.0,
            access_recency_days: 0.0,
            relation_count: 0,
            importance_score,
            avg_rel_confidence: 0.0,
        },
        &ScoringConfig::default(),
    );
    assert!(score > 0.5, "fresh bugfix relevance {score} should be substantial");
}
