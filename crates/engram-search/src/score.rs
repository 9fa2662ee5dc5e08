//! Importance and decayed-relevance scoring.
//!
//! Importance is a slowly-changing property of an observation, recomputed
//! on ingest and feedback. Relevance is computed lazily at query time and
//! additionally decays with age and access recency.

use engram_core::{Concept, Observation, ObservationType};
use engram_config::ScoringConfig;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Base weight per observation type; unknown types would score 1.0, but
/// the type enum is closed so every variant is covered.
#[must_use]
pub const fn type_weight(obs_type: ObservationType) -> f64 {
    match obs_type {
        ObservationType::Bugfix => 1.3,
        ObservationType::Feature => 1.2,
        ObservationType::Discovery | ObservationType::Decision => 1.1,
        ObservationType::Refactor => 1.0,
        ObservationType::Change => 0.9,
    }
}

/// Fixed concept weight table; concepts outside the recognized set never
/// reach scoring (they are dropped at SDK extraction).
#[must_use]
pub const fn concept_weight(concept: Concept) -> f64 {
    match concept {
        Concept::Security => 0.30,
        Concept::Gotcha => 0.25,
        Concept::BestPractice | Concept::AntiPattern => 0.20,
        Concept::Performance | Concept::Architecture | Concept::Concurrency => 0.15,
        Concept::Database | Concept::Api | Concept::ErrorHandling | Concept::Testing => 0.10,
        Concept::Configuration | Concept::Dependency => 0.05,
    }
}

/// Importance of an observation at `now_epoch_ms`:
///
/// ```text
/// base·0.5^(age/half_life) + feedback + concepts + retrievals
/// ```
///
/// floored at `config.min_score`.
#[must_use]
pub fn importance(obs: &Observation, now_epoch_ms: i64, config: &ScoringConfig) -> f64 {
    let base = type_weight(obs.obs_type);

    #[allow(clippy::cast_precision_loss)]
    let age_days = ((now_epoch_ms - obs.created_at_epoch) as f64 / MS_PER_DAY).max(0.0);
    let recency_decay = 0.5_f64.powf(age_days / config.half_life_days);

    let feedback = config.feedback_weight * f64::from(obs.user_feedback);

    let concepts: f64 = obs
        .concepts
        .iter()
        .map(|c| config.concept_scalar * concept_weight(*c))
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let retrievals = (1.0 + obs.retrieval_count as f64).log2() * 0.1 * 0.15;

    (base * recency_decay + feedback + concepts + retrievals).max(config.min_score)
}

/// Inputs to the lazy relevance score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceInputs {
    pub age_days: f64,
    pub access_recency_days: f64,
    pub relation_count: u64,
    pub importance_score: f64,
    /// Mean confidence of the observation's relations, in `[0, 1]`.
    pub avg_rel_confidence: f64,
}

/// Query-time decayed relevance:
///
/// ```text
/// decay       = e^(−base_decay·age)
/// access      = e^(−access_decay·access_recency)
/// relFactor   = 1 + relation_weight·ln(1 + relations)
/// importanceF = 0.5 + importance
/// confidenceF = 0.7 + 0.3·avg_confidence
/// relevance   = max(min, decay·(0.3 + 0.3·access)·relFactor·importanceF·confidenceF)
/// ```
#[must_use]
pub fn relevance(inputs: &RelevanceInputs, config: &ScoringConfig) -> f64 {
    let decay = (-config.base_decay * inputs.age_days).exp();
    let access = (-config.access_decay * inputs.access_recency_days).exp();
    #[allow(clippy::cast_precision_loss)]
    let rel_factor = 1.0 + config.relation_weight * (1.0 + inputs.relation_count as f64).ln();
    let importance_factor = 0.5 + inputs.importance_score;
    let confidence_factor = 0.7 + 0.3 * inputs.avg_rel_confidence;

    (decay * (0.3 + 0.3 * access) * rel_factor * importance_factor * confidence_factor)
        .max(config.min_relevance)
}
