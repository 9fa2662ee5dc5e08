//! In-process brute-force backend.
//!
//! Holds every row in a `HashMap` and scans it per query. Fine for
//! ephemeral stores and tests; the DuckDB backend is the durable variant.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use engram_core::{StaleVector, VectorRow};

use crate::backend::{BackendHit, QueryFilter, VectorBackend, filter_matches};
use crate::error::StoreError;

/// Brute-force cosine backend over an in-memory map.
#[derive(Default)]
pub struct MemoryBackend {
    rows: RwLock<HashMap<String, VectorRow>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Doubled cosine distance in `[0, 2]`; zero vectors are maximally distant
/// from everything (they are never indexed, so this only guards reads).
fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

impl MemoryBackend {
    fn scan(&self, embedding: &[f32], filter: &QueryFilter) -> Vec<BackendHit> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut hits: Vec<BackendHit> = rows
            .values()
            .filter(|row| filter_matches(filter, &row.metadata))
            .map(|row| BackendHit {
                doc_id: row.doc_id.clone(),
                distance: cosine_distance(&row.embedding, embedding),
                metadata: row.metadata.clone(),
            })
            .collect();
        // Deterministic order: distance, then doc_id for ties.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits
    }
}

impl VectorBackend for MemoryBackend {
    fn upsert(&self, rows: &[VectorRow]) -> Result<(), StoreError> {
        let mut map = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        for row in rows {
            map.insert(row.doc_id.clone(), row.clone());
        }
        Ok(())
    }

    fn delete(&self, doc_ids: &[String]) -> Result<usize, StoreError> {
        let mut map = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        for id in doc_ids {
            if map.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn delete_by_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut map = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let before = map.len();
        map.retain(|id, _| !id.starts_with(prefix));
        Ok(before - map.len())
    }

    fn top_k(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<BackendHit>, StoreError> {
        let mut hits = self.scan(embedding, filter);
        hits.truncate(k);
        Ok(hits)
    }

    fn top_k_grouped(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<BackendHit>, StoreError> {
        let hits = self.scan(embedding, filter);
        let mut best: BTreeMap<i64, BackendHit> = BTreeMap::new();
        for hit in hits {
            best.entry(hit.metadata.sqlite_id).or_insert(hit);
        }
        let mut grouped: Vec<BackendHit> = best.into_values().collect();
        grouped.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        grouped.truncate(k);
        Ok(grouped)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.len() as u64)
    }

    fn stale(&self, current_version: &str) -> Result<Vec<StaleVector>, StoreError> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut stale: Vec<StaleVector> = rows
            .values()
            .filter(|row| row.model_version != current_version)
            .map(|row| StaleVector {
                doc_id: row.doc_id.clone(),
                sqlite_id: row.metadata.sqlite_id,
                doc_type: row.metadata.doc_type,
                field_type: row.metadata.field_type.clone(),
                project: row.metadata.project.clone(),
                scope: row.metadata.scope,
            })
            .collect();
        stale.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
        Ok(stale)
    }

    fn version_counts(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts = BTreeMap::new();
        for row in rows.values() {
            *counts.entry(row.model_version.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn coverage_by_type(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts = BTreeMap::new();
        for row in rows.values() {
            *counts
                .entry(row.metadata.doc_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn project_counts(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts = BTreeMap::new();
        for row in rows.values() {
            *counts
                .entry(row.metadata.project.clone().unwrap_or_default())
                .or_insert(0) += 1;
        }
        Ok(counts)
    }
}
