//! # engram-search
//!
//! Hybrid retrieval for Engram: query intent classification and bounded
//! weighted expansion, the ONNX cross-encoder reranker with α-blended
//! scoring, importance and decayed-relevance scoring, and the `Retriever`
//! pipeline composing them over the vector store.

pub mod cross_encoder;
pub mod error;
pub mod expand;
pub mod pipeline;
pub mod rerank;
pub mod score;
pub mod vocab;

pub use cross_encoder::CrossEncoder;
pub use error::SearchError;
pub use expand::{Expansion, Intent, QueryExpander, classify_intent, key_terms};
pub use pipeline::{RetrievalHit, Retriever};
pub use rerank::{PairScorer, RerankCandidate, RerankResult, Reranker, sigmoid};
pub use score::{RelevanceInputs, concept_weight, importance, relevance, type_weight};
pub use vocab::{VocabTerm, Vocabulary};
