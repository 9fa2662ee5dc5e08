//! Stored pattern entity.
//!
//! Patterns are distilled, reusable recommendations promoted out of
//! observations. Each of the three text fields is embedded as its own
//! vector row (`pattern_{id}_{name|description|recommendation}`).

use serde::{Deserialize, Serialize};

use crate::enums::{PatternField, Scope};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: i64,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    /// Creation time, epoch milliseconds.
    pub created_at_epoch: i64,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl Pattern {
    /// Field content by pattern-field name, for doc-id generation.
    /// Empty fields return `None` and are not embedded.
    #[must_use]
    pub fn field(&self, field: PatternField) -> Option<&str> {
        let value = match field {
            PatternField::Name => Some(self.name.as_str()),
            PatternField::Description => Some(self.description.as_str()),
            PatternField::Recommendation => self.recommendation.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn field_accessor_skips_empty_fields() {
        let pattern = Pattern {
            id: 4,
            name: "retry with jitter".to_string(),
            description: "add randomized backoff to retry loops".to_string(),
            recommendation: None,
            created_at_epoch: 1_750_000_000_000,
            scope: Scope::Global,
            project: None,
        };
        assert_eq!(pattern.field(PatternField::Name), Some("retry with jitter"));
        assert_eq!(pattern.field(PatternField::Recommendation), None);
    }
}
