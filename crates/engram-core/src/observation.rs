//! Observation and session-summary provenance entities.
//!
//! These live in the relational store outside the vector engine; the engine
//! references them by `sqlite_id` and derives vector rows from their fields.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::enums::{Concept, ObservationType, Scope};

/// A structured note extracted from an assistant session, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub obs_type: ObservationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<Concept>,
    #[serde(default)]
    pub files_read: Vec<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    /// Creation time, epoch milliseconds.
    pub created_at_epoch: i64,
    /// Explicit user feedback: −1, 0, or +1.
    #[serde(default)]
    pub user_feedback: i8,
    /// How often retrieval has surfaced this observation.
    #[serde(default)]
    pub retrieval_count: u64,
    /// Last computed importance score (see the scoring component).
    #[serde(default)]
    pub importance_score: f64,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl Observation {
    /// A fresh observation with defaults for everything the SDK does not
    /// supply. `created_at_epoch` is stamped with the current time.
    #[must_use]
    pub fn new(id: i64, obs_type: ObservationType) -> Self {
        Self {
            id,
            obs_type,
            title: None,
            subtitle: None,
            narrative: None,
            facts: Vec::new(),
            concepts: Vec::new(),
            files_read: Vec::new(),
            files_modified: Vec::new(),
            created_at_epoch: Utc::now().timestamp_millis(),
            user_feedback: 0,
            retrieval_count: 0,
            importance_score: 0.0,
            scope: Scope::Unset,
            project: None,
        }
    }

    /// Build a persisted observation from an SDK draft.
    #[must_use]
    pub fn from_draft(id: i64, draft: ObservationDraft) -> Self {
        let mut obs = Self::new(id, draft.obs_type);
        obs.title = draft.title;
        obs.subtitle = draft.subtitle;
        obs.narrative = draft.narrative;
        obs.facts = draft.facts;
        obs.concepts = draft.concepts;
        obs.files_read = draft.files_read;
        obs.files_modified = draft.files_modified;
        obs
    }
}

/// An observation as extracted from an SDK block, before it has been
/// assigned a relational row id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationDraft {
    #[serde(default)]
    pub obs_type: ObservationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<Concept>,
    #[serde(default)]
    pub files_read: Vec<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
}

/// A session summary as extracted from an SDK `<summary>` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investigated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learned: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SummaryDraft {
    /// Whether every field is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.request.is_none()
            && self.investigated.is_none()
            && self.learned.is_none()
            && self.completed.is_none()
            && self.next_steps.is_none()
            && self.notes.is_none()
    }

    /// Field content by summary-field name, for doc-id generation.
    #[must_use]
    pub fn field(&self, field: crate::enums::SummaryField) -> Option<&str> {
        use crate::enums::SummaryField as F;
        match field {
            F::Request => self.request.as_deref(),
            F::Investigated => self.investigated.as_deref(),
            F::Learned => self.learned.as_deref(),
            F::Completed => self.completed.as_deref(),
            F::NextSteps => self.next_steps.as_deref(),
            F::Notes => self.notes.as_deref(),
        }
    }
}
