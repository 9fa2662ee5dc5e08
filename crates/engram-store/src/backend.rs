//! The `VectorBackend` capability set and query filter types.
//!
//! The store is polymorphic over backends: a DuckDB variant for on-disk or
//! in-memory relational storage with the vector functions, and a pure
//! in-process brute-force variant for ephemeral use and tests. Backends
//! speak raw distances; similarity conversion happens in the facade.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use engram_core::{DocMetadata, DocType, StaleVector, VectorRow};

use crate::error::StoreError;

/// Recognized `where` filters. Unknown keys are ignored by construction.
///
/// The `project` filter intentionally matches global rows too:
/// `project = :p OR scope = 'global'`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub doc_type: Option<DocType>,
    pub project: Option<String>,
}

impl QueryFilter {
    /// Build a filter from a caller-supplied `where` map, ignoring every
    /// key other than `doc_type` and `project`.
    #[must_use]
    pub fn from_where(where_map: &HashMap<String, String>) -> Self {
        Self {
            doc_type: where_map
                .get("doc_type")
                .and_then(|v| DocType::from_str(v).ok()),
            project: where_map.get("project").cloned(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.doc_type.is_none() && self.project.is_none()
    }
}

/// A raw backend hit: doc id, cosine distance (0..=2), and stored metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendHit {
    pub doc_id: String,
    pub distance: f64,
    pub metadata: DocMetadata,
}

/// Persistence capability set required by the vector store facade.
///
/// Implementations are internally synchronized; callers still serialize
/// writes at the facade level so result-cache invalidation stays inside
/// the write critical section.
pub trait VectorBackend: Send + Sync {
    /// Upsert rows by `doc_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure; no partial visibility
    /// guarantees are made across rows.
    fn upsert(&self, rows: &[VectorRow]) -> Result<(), StoreError>;

    /// Delete by exact `doc_id`; missing ids are not an error.
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn delete(&self, doc_ids: &[String]) -> Result<usize, StoreError>;

    /// Delete every row whose `doc_id` starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn delete_by_prefix(&self, prefix: &str) -> Result<usize, StoreError>;

    /// Filtered top-k by ascending cosine distance.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn top_k(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<BackendHit>, StoreError>;

    /// Like [`Self::top_k`] but returns only the best-scoring row per
    /// `sqlite_id` (ranked partition, top-1 per group).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn top_k_grouped(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<BackendHit>, StoreError>;

    /// Total row count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn count(&self) -> Result<u64, StoreError>;

    /// Rows whose `model_version` is null or differs from `current_version`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn stale(&self, current_version: &str) -> Result<Vec<StaleVector>, StoreError>;

    /// Row count per distinct `model_version`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn version_counts(&self) -> Result<BTreeMap<String, u64>, StoreError>;

    /// Row count per `doc_type`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn coverage_by_type(&self) -> Result<BTreeMap<String, u64>, StoreError>;

    /// Row count per `project` (empty project keyed as `""`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure.
    fn project_counts(&self) -> Result<BTreeMap<String, u64>, StoreError>;
}

/// Whether a row passes the filter. Shared by backends that evaluate
/// filters in process.
#[must_use]
pub fn filter_matches(filter: &QueryFilter, metadata: &DocMetadata) -> bool {
    if let Some(doc_type) = filter.doc_type {
        if metadata.doc_type != doc_type {
            return false;
        }
    }
    if let Some(project) = &filter.project {
        let is_global = metadata.scope == engram_core::Scope::Global;
        let same_project = metadata.project.as_deref() == Some(project.as_str());
        if !same_project && !is_global {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::Scope;
    use pretty_assertions::assert_eq;

    fn meta(doc_type: DocType, project: Option<&str>, scope: Scope) -> DocMetadata {
        let mut m = DocMetadata::new(1, doc_type);
        m.project = project.map(ToString::to_string);
        m.scope = scope;
        m
    }

    #[test]
    fn from_where_ignores_unknown_keys() {
        let mut map = HashMap::new();
        map.insert("doc_type".to_string(), "observation".to_string());
        map.insert("project".to_string(), "engram".to_string());
        map.insert("color".to_string(), "purple".to_string());

        let filter = QueryFilter::from_where(&map);
        assert_eq!(filter.doc_type, Some(DocType::Observation));
        assert_eq!(filter.project.as_deref(), Some("engram"));
    }

    #[test]
    fn from_where_ignores_bad_doc_type_values() {
        let mut map = HashMap::new();
        map.insert("doc_type".to_string(), "nonsense".to_string());
        let filter = QueryFilter::from_where(&map);
        assert!(filter.is_empty() || filter.doc_type.is_none());
    }

    #[test]
    fn project_filter_admits_global_rows() {
        let filter = QueryFilter {
            doc_type: None,
            project: Some("engram".to_string()),
        };
        assert!(filter_matches(
            &filter,
            &meta(DocType::Observation, Some("engram"), Scope::Project)
        ));
        assert!(filter_matches(
            &filter,
            &meta(DocType::Observation, Some("other"), Scope::Global)
        ));
        assert!(!filter_matches(
            &filter,
            &meta(DocType::Observation, Some("other"), Scope::Project)
        ));
        assert!(!filter_matches(&filter, &meta(DocType::Observation, None, Scope::Unset)));
    }

    #[test]
    fn doc_type_filter_is_exact() {
        let filter = QueryFilter {
            doc_type: Some(DocType::UserPrompt),
            project: None,
        };
        assert!(filter_matches(&filter, &meta(DocType::UserPrompt, None, Scope::Unset)));
        assert!(!filter_matches(&filter, &meta(DocType::Observation, None, Scope::Unset)));
    }
}
