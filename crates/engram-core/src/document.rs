//! Document, vector-row, and query-result types for the vector store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::{DocType, Scope};

/// Structured metadata attached to every vector row.
///
/// `sqlite_id` and `doc_type` are required provenance; everything else is
/// optional. Free-form extras are stored as a single `k=v,k=v` column; see
/// [`DocMetadata::extra_joined`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetadata {
    /// Row id of the source entity in the relational store.
    pub sqlite_id: i64,
    pub doc_type: DocType,
    /// Which field of the source entity this vector covers
    /// (e.g. `narrative`, `fact`, `name`, `description`, `prompt`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default)]
    pub scope: Scope,
    /// Source creation time, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_epoch: Option<i64>,
    /// Observation type for `doc_type = observation` rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obs_type: Option<String>,
    /// Free string extras; unknown keys from callers land here.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl DocMetadata {
    /// Minimal metadata with only the required provenance fields.
    #[must_use]
    pub fn new(sqlite_id: i64, doc_type: DocType) -> Self {
        Self {
            sqlite_id,
            doc_type,
            field_type: None,
            project: None,
            scope: Scope::Unset,
            created_at_epoch: None,
            obs_type: None,
            extra: BTreeMap::new(),
        }
    }

    /// Join the extras into the stored `k=v,k=v` column form.
    #[must_use]
    pub fn extra_joined(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.extra {
            if !out.is_empty() {
                out.push(',');
            }
            out.push_str(k);
            out.push('=');
            out.push_str(v);
        }
        out
    }

    /// Parse a stored `k=v,k=v` column back into an extras map.
    ///
    /// Segments without `=` are skipped; later duplicate keys win.
    #[must_use]
    pub fn parse_extra(joined: &str) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for segment in joined.split(',') {
            if let Some((k, v)) = segment.split_once('=') {
                if !k.is_empty() {
                    map.insert(k.to_string(), v.to_string());
                }
            }
        }
        map
    }
}

/// The ingest-side unit: content plus metadata, not yet embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub content: String,
    pub metadata: DocMetadata,
}

/// A fully materialized vector row as persisted by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRow {
    pub doc_id: String,
    pub embedding: Vec<f32>,
    pub metadata: DocMetadata,
    /// Version of the embedding model that produced `embedding`.
    /// Non-null after insert; rows whose version differs from the active
    /// model's are stale and eligible for rebuild.
    pub model_version: String,
}

/// A single result from a filtered top-k query.
///
/// `distance` is doubled cosine distance (0 = identical, 2 = opposite);
/// `similarity = 1 − distance / 2` holds exactly for every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    pub distance: f64,
    pub similarity: f64,
    pub metadata: DocMetadata,
}

impl QueryResult {
    /// Build a result from a backend distance, deriving similarity.
    #[must_use]
    pub fn from_distance(id: String, distance: f64, metadata: DocMetadata) -> Self {
        Self {
            id,
            distance,
            similarity: 1.0 - distance / 2.0,
            metadata,
        }
    }
}

/// Descriptor of a stale vector row, enough for the ingest layer to
/// re-format the source content and re-embed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleVector {
    pub doc_id: String,
    pub sqlite_id: i64,
    pub doc_type: DocType,
    pub field_type: Option<String>,
    pub project: Option<String>,
    pub scope: Scope,
}

/// Identity of a registered embedding model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    /// Opaque version string; vector rows record this for staleness checks.
    pub version: String,
    pub dimensions: usize,
    /// Whether this model is the registry default. The last registration
    /// with `default = true` wins.
    #[serde(default)]
    pub default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn similarity_is_one_minus_half_distance() {
        let meta = DocMetadata::new(1, DocType::Observation);
        let r = QueryResult::from_distance("obs_1_narrative".into(), 0.0, meta.clone());
        assert!((r.similarity - 1.0).abs() < f64::EPSILON);

        let r = QueryResult::from_distance("obs_1_narrative".into(), 2.0, meta.clone());
        assert!(r.similarity.abs() < f64::EPSILON);

        let r = QueryResult::from_distance("obs_1_narrative".into(), 0.5, meta);
        assert!((r.similarity - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn extras_join_and_parse_round_trip() {
        let mut meta = DocMetadata::new(7, DocType::Pattern);
        meta.extra.insert("lang".into(), "rust".into());
        meta.extra.insert("repo".into(), "engram".into());

        let joined = meta.extra_joined();
        assert_eq!(joined, "lang=rust,repo=engram");
        assert_eq!(DocMetadata::parse_extra(&joined), meta.extra);
    }

    #[test]
    fn parse_extra_skips_malformed_segments() {
        let map = DocMetadata::parse_extra("a=1,garbage,=nope,b=2");
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], "1");
        assert_eq!(map["b"], "2");
    }
}
