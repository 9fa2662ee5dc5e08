//! # engram-core
//!
//! Core types shared across all Engram crates:
//! - Document / metadata / query-result types for the vector store
//! - Observation and session-summary provenance entities
//! - Doc-id template constructors (the canonical id shapes external callers
//!   rely on)
//! - Enums with `snake_case` serialization and SQL string forms
//! - Cross-cutting error types
//! - SDK tag extraction for assistant-produced observation blocks

pub mod document;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod observation;
pub mod pattern;
pub mod sdk;

pub use document::{DocMetadata, Document, ModelMetadata, QueryResult, StaleVector, VectorRow};
pub use enums::{Concept, DocType, ObservationType, PatternField, Scope, SummaryField};
pub use errors::CoreError;
pub use observation::{Observation, ObservationDraft, SummaryDraft};
pub use pattern::Pattern;
