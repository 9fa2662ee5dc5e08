//! Query intent classification and bounded weighted expansion.
//!
//! A query fans out into at most `max_expansions` variants: the original
//! (always first, weight 1.0), one rewrite per matching intent, and up to
//! two vocabulary-similar terms. Variants are deduplicated by
//! case-insensitive trimmed form, first occurrence winning.

use std::sync::{Arc, LazyLock};

use engram_config::ExpansionConfig;
use engram_embed::{Embedder, cosine_similarity};
use regex::RegexSet;
use serde::Serialize;
use tracing::debug;

use crate::error::SearchError;
use crate::vocab::Vocabulary;

/// Detected query intent, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Error,
    Question,
    Implementation,
    Architecture,
    General,
}

static ERROR_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\b(error|bug|issue|problem|fail|crash|exception|panic)\b",
        r"(?i)\b(fix|debug|troubleshoot|resolve)\b",
        r"(?i)\b(doesn't work|not working|broken)\b",
    ])
    .expect("error intent patterns compile")
});

static QUESTION_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^(how|why|what|when|where|which|who)\b",
        r"\?$",
        r"(?i)\b(explain|describe|understand)\b",
    ])
    .expect("question intent patterns compile")
});

static IMPLEMENTATION_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\b(implement|add|create|build|write|code)\b",
        r"(?i)\b(function|method|handler|endpoint|api)\b",
        r"(?i)\b(feature|functionality)\b",
    ])
    .expect("implementation intent patterns compile")
});

static ARCHITECTURE_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\b(architecture|design|pattern|structure)\b",
        r"(?i)\b(component|module|layer|service)\b",
        r"(?i)\b(flow|pipeline|workflow)\b",
    ])
    .expect("architecture intent patterns compile")
});

/// Stop words excluded from key-term extraction.
const STOP_WORDS: &[&str] = &[
    "a", "the", "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "can", "i", "me", "my",
    "we", "our", "you", "your", "it", "its", "this", "that", "these", "those", "what", "which",
    "who", "whom", "how", "why", "when", "where", "to", "for", "with", "about", "from", "in",
    "on", "at", "by", "of", "and", "or", "but", "if", "then",
];

/// Leading interrogative phrases stripped for the declarative rewrite.
const QUESTION_LEADS: &[&str] = &[
    "how do i ",
    "how to ",
    "how does ",
    "how is ",
    "what is ",
    "what are ",
    "why does ",
    "why is ",
    "where is ",
    "where are ",
    "when does ",
    "when is ",
];

/// One emitted query variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expansion {
    pub text: String,
    pub weight: f32,
    /// Provenance: `original`, `intent:…`, or `vocabulary:{term}`.
    pub source: String,
}

/// Classify a query's primary intent; first match in priority order wins.
#[must_use]
pub fn classify_intent(query: &str) -> Intent {
    let query = query.trim();
    if ERROR_PATTERNS.is_match(query) {
        Intent::Error
    } else if QUESTION_PATTERNS.is_match(query) {
        Intent::Question
    } else if IMPLEMENTATION_PATTERNS.is_match(query) {
        Intent::Implementation
    } else if ARCHITECTURE_PATTERNS.is_match(query) {
        Intent::Architecture
    } else {
        Intent::General
    }
}

/// Lowercased, punctuation-stripped content words of a query.
#[must_use]
pub fn key_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|token| token.trim_matches(|c| ".,?!;:'\"()[]{}".contains(c)))
        .filter(|token| token.len() >= 2 && !STOP_WORDS.contains(token))
        .map(ToString::to_string)
        .collect()
}

/// Declarative form of a question: drop the trailing `?` and any leading
/// interrogative phrase.
fn declarative_form(query: &str) -> String {
    let mut text = query.trim().trim_end_matches('?').trim().to_string();
    let lower = text.to_lowercase();
    for lead in QUESTION_LEADS {
        if lower.starts_with(lead) {
            text = text[lead.len()..].trim().to_string();
            break;
        }
    }
    text
}

/// Bounded weighted query expansion.
#[derive(Clone)]
pub struct QueryExpander {
    config: ExpansionConfig,
    embedder: Option<Arc<dyn Embedder>>,
    vocabulary: Option<Vocabulary>,
}

impl QueryExpander {
    /// Expander without vocabulary support (intent rewrites only).
    #[must_use]
    pub const fn new(config: ExpansionConfig) -> Self {
        Self {
            config,
            embedder: None,
            vocabulary: None,
        }
    }

    /// Expander with a pre-embedded vocabulary for similarity expansion.
    #[must_use]
    pub const fn with_vocabulary(
        config: ExpansionConfig,
        embedder: Arc<dyn Embedder>,
        vocabulary: Vocabulary,
    ) -> Self {
        Self {
            config,
            embedder: Some(embedder),
            vocabulary: Some(vocabulary),
        }
    }

    /// Expand a query into at most `max_expansions` deduplicated variants,
    /// the original always present and first.
    #[must_use]
    pub fn expand(&self, query: &str) -> Vec<Expansion> {
        let query = query.trim();
        let mut expansions = vec![Expansion {
            text: query.to_string(),
            weight: 1.0,
            source: "original".to_string(),
        }];
        if query.is_empty() {
            return expansions;
        }

        let terms = key_terms(query);
        let joined_terms = terms.join(" ");

        // Every matching intent contributes its rewrite, in detection
        // priority order.
        if ERROR_PATTERNS.is_match(query) && !joined_terms.is_empty() {
            expansions.push(Expansion {
                text: format!("{joined_terms} solution fix"),
                weight: 0.8,
                source: "intent:solution".to_string(),
            });
        }
        if QUESTION_PATTERNS.is_match(query) {
            let declarative = declarative_form(query);
            if !declarative.is_empty() {
                expansions.push(Expansion {
                    text: declarative,
                    weight: 0.85,
                    source: "intent:declarative".to_string(),
                });
            }
        }
        if IMPLEMENTATION_PATTERNS.is_match(query) && !joined_terms.is_empty() {
            expansions.push(Expansion {
                text: format!("how {joined_terms}"),
                weight: 0.75,
                source: "intent:how".to_string(),
            });
        }
        if ARCHITECTURE_PATTERNS.is_match(query) && !joined_terms.is_empty() {
            expansions.push(Expansion {
                text: format!("{joined_terms} design structure"),
                weight: 0.75,
                source: "intent:design".to_string(),
            });
        }

        if self.config.enable_vocabulary_expansion {
            if let Err(err) = self.expand_vocabulary(query, &joined_terms, &mut expansions) {
                debug!(error = %err, "vocabulary expansion skipped");
            }
        }

        dedupe(&mut expansions);
        expansions.truncate(self.config.max_expansions);
        expansions
    }

    /// Append up to two vocabulary-similar variants.
    fn expand_vocabulary(
        &self,
        query: &str,
        joined_terms: &str,
        expansions: &mut Vec<Expansion>,
    ) -> Result<(), SearchError> {
        let (Some(embedder), Some(vocabulary)) = (&self.embedder, &self.vocabulary) else {
            return Ok(());
        };
        if vocabulary.is_empty() || joined_terms.is_empty() {
            return Ok(());
        }

        let query_embedding = embedder.embed(query)?;
        let query_lower = query.to_lowercase();

        let mut scored: Vec<(f32, &crate::vocab::VocabTerm)> = vocabulary
            .terms()
            .iter()
            .map(|term| (cosine_similarity(&query_embedding, &term.embedding), term))
            .filter(|(similarity, _)| *similarity >= self.config.min_similarity)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut taken = 0;
        for (similarity, term) in scored {
            if taken == 2 {
                break;
            }
            // A term the query already contains adds nothing.
            if query_lower.contains(&term.term.to_lowercase()) {
                continue;
            }
            expansions.push(Expansion {
                text: format!("{joined_terms} {}", term.term),
                weight: 0.7 * similarity * term.weight,
                source: format!("vocabulary:{}", term.term),
            });
            taken += 1;
        }
        Ok(())
    }
}

/// Case-insensitive trimmed dedup; the first occurrence wins.
fn dedupe(expansions: &mut Vec<Expansion>) {
    let mut seen = std::collections::HashSet::new();
    expansions.retain(|e| seen.insert(e.text.trim().to_lowercase()));
}
