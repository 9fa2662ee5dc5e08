//! Canonical doc-id templates.
//!
//! External callers rely on these exact shapes; the vector store itself
//! treats doc-ids as opaque. All ids are generated here, never inferred
//! from text at query time.

use crate::enums::{PatternField, SummaryField};

/// `obs_{id}_narrative`
#[must_use]
pub fn observation_narrative(id: i64) -> String {
    format!("obs_{id}_narrative")
}

/// `obs_{id}_fact_{index}`
#[must_use]
pub fn observation_fact(id: i64, index: usize) -> String {
    format!("obs_{id}_fact_{index}")
}

/// `obs_{id}_` — the prefix shared by every row derived from observation
/// `id`, used for cascade deletion.
#[must_use]
pub fn observation_prefix(id: i64) -> String {
    format!("obs_{id}_")
}

/// `summary_{id}_{field}`
#[must_use]
pub fn summary_field(id: i64, field: SummaryField) -> String {
    format!("summary_{id}_{}", field.as_str())
}

/// `prompt_{id}`
#[must_use]
pub fn user_prompt(id: i64) -> String {
    format!("prompt_{id}")
}

/// `pattern_{id}_{name|description|recommendation}`
#[must_use]
pub fn pattern_field(id: i64, field: PatternField) -> String {
    format!("pattern_{id}_{}", field.as_str())
}
