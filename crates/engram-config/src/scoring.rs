//! Importance and relevance scoring constants.

use serde::{Deserialize, Serialize};

const fn default_half_life_days() -> f64 {
    7.0
}

const fn default_feedback_weight() -> f64 {
    0.30
}

const fn default_concept_scalar() -> f64 {
    0.20
}

const fn default_min_score() -> f64 {
    0.01
}

const fn default_base_decay() -> f64 {
    0.1
}

const fn default_access_decay() -> f64 {
    0.05
}

const fn default_relation_weight() -> f64 {
    0.3
}

const fn default_min_relevance() -> f64 {
    0.001
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoringConfig {
    /// Importance recency half-life, in days.
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,

    /// Weight of explicit user feedback (−1/0/+1).
    #[serde(default = "default_feedback_weight")]
    pub feedback_weight: f64,

    /// Scalar applied to each recognized concept's weight.
    #[serde(default = "default_concept_scalar")]
    pub concept_scalar: f64,

    /// Importance floor.
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    /// Relevance age decay rate (per day).
    #[serde(default = "default_base_decay")]
    pub base_decay: f64,

    /// Relevance access-recency decay rate (per day).
    #[serde(default = "default_access_decay")]
    pub access_decay: f64,

    /// Weight of the relation-count boost.
    #[serde(default = "default_relation_weight")]
    pub relation_weight: f64,

    /// Relevance floor.
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            half_life_days: default_half_life_days(),
            feedback_weight: default_feedback_weight(),
            concept_scalar: default_concept_scalar(),
            min_score: default_min_score(),
            base_decay: default_base_decay(),
            access_decay: default_access_decay(),
            relation_weight: default_relation_weight(),
            min_relevance: default_min_relevance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = ScoringConfig::default();
        assert!((config.half_life_days - 7.0).abs() < f64::EPSILON);
        assert!((config.feedback_weight - 0.30).abs() < f64::EPSILON);
        assert!((config.concept_scalar - 0.20).abs() < f64::EPSILON);
        assert!((config.min_score - 0.01).abs() < f64::EPSILON);
        assert!((config.base_decay - 0.1).abs() < f64::EPSILON);
        assert!((config.access_decay - 0.05).abs() < f64::EPSILON);
        assert!((config.relation_weight - 0.3).abs() < f64::EPSILON);
        assert!((config.min_relevance - 0.001).abs() < f64::EPSILON);
    }
}
