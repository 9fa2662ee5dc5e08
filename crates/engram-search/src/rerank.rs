//! Cross-encoder reranking: score combination, ranking, and the
//! `PairScorer` seam the ONNX cross-encoder plugs into.

use serde::Serialize;
use serde_json::Value;

use crate::error::SearchError;

/// Default α when the configured value falls outside `(0, 1]`.
const DEFAULT_ALPHA: f64 = 0.7;

/// Default result limit when the caller passes `limit <= 0`.
const DEFAULT_LIMIT: usize = 10;

/// Logistic squash with saturation: exactly 1.0 above +20, exactly 0.0
/// below −20.
#[must_use]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 20.0 {
        1.0
    } else if x <= -20.0 {
        0.0
    } else {
        1.0 / (1.0 + (-x).exp())
    }
}

/// A candidate entering reranking: prior bi-encoder score plus content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerankCandidate {
    pub id: String,
    pub content: String,
    /// Prior bi-encoder score in `[0, 1]`.
    pub score: f64,
    /// Opaque caller metadata, preserved verbatim.
    #[serde(default)]
    pub metadata: Value,
}

/// A reranked result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerankResult {
    pub id: String,
    pub content: String,
    /// Final score the ordering is based on.
    pub combined_score: f64,
    /// `σ(logit)` from the cross-encoder.
    pub cross_score: f64,
    /// The candidate's prior bi-encoder score.
    pub prior_score: f64,
    /// 1-indexed position after reranking.
    pub rerank_rank: usize,
    /// `original_rank − rerank_rank`; positive means promoted.
    pub rank_improvement: i64,
    pub metadata: Value,
}

/// Produces one relevance logit per (query, document) pair.
pub trait PairScorer: Send + Sync {
    /// Raw logits, one per document, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Rerank`] on tokenizer or inference failure.
    fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<f64>, SearchError>;
}

/// Combines cross-encoder scores with bi-encoder priors and re-ranks.
pub struct Reranker {
    scorer: Box<dyn PairScorer>,
    alpha: f64,
}

impl Reranker {
    /// `alpha` outside `(0, 1]` (including 0, which would discard the
    /// cross-encoder entirely) re-defaults to 0.7.
    #[must_use]
    pub fn new(scorer: Box<dyn PairScorer>, alpha: f64) -> Self {
        let alpha = if alpha > 0.0 && alpha <= 1.0 {
            alpha
        } else {
            DEFAULT_ALPHA
        };
        Self { scorer, alpha }
    }

    /// Rerank with `combined = α·σ(logit) + (1−α)·prior`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Rerank`] when the scorer fails.
    pub fn rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
        limit: i64,
    ) -> Result<Vec<RerankResult>, SearchError> {
        self.run(query, candidates, limit, true)
    }

    /// Rerank purely by `σ(logit)`, ignoring priors.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Rerank`] when the scorer fails.
    pub fn rerank_by_score(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
        limit: i64,
    ) -> Result<Vec<RerankResult>, SearchError> {
        self.run(query, candidates, limit, false)
    }

    fn run(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
        limit: i64,
        use_prior: bool,
    ) -> Result<Vec<RerankResult>, SearchError> {
        let limit = usize::try_from(limit)
            .ok()
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let documents: Vec<String> = candidates.iter().map(|c| c.content.clone()).collect();
        let logits = self.scorer.score_pairs(query, &documents)?;
        if logits.len() != candidates.len() {
            return Err(SearchError::Rerank(format!(
                "scorer returned {} logits for {} candidates",
                logits.len(),
                candidates.len()
            )));
        }

        // (original_rank, candidate, combined, cross)
        let mut scored: Vec<(usize, &RerankCandidate, f64, f64)> = candidates
            .iter()
            .zip(logits)
            .enumerate()
            .map(|(i, (candidate, logit))| {
                let cross = sigmoid(logit);
                let combined = if use_prior {
                    self.alpha * cross + (1.0 - self.alpha) * candidate.score
                } else {
                    cross
                };
                (i + 1, candidate, combined, cross)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        Ok(scored
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (original_rank, candidate, combined, cross))| {
                let rerank_rank = i + 1;
                #[allow(clippy::cast_possible_wrap)]
                let rank_improvement = original_rank as i64 - rerank_rank as i64;
                RerankResult {
                    id: candidate.id.clone(),
                    content: candidate.content.clone(),
                    combined_score: combined,
                    cross_score: cross,
                    prior_score: candidate.score,
                    rerank_rank,
                    rank_improvement,
                    metadata: candidate.metadata.clone(),
                }
            })
            .collect())
    }
}
