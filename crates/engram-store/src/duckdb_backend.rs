//! DuckDB-backed vector persistence.
//!
//! Embeddings are stored as `FLOAT[]` and cast to `FLOAT[D]` at query time
//! for `array_cosine_similarity()`. The Rust `Appender` API does not
//! reliably handle `FLOAT[]` columns from `Vec<f32>`, so rows go through
//! parameterized `INSERT OR REPLACE` with string-serialized arrays and a
//! `::FLOAT[]` cast.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use duckdb::{Connection, params};
use engram_core::{DocMetadata, DocType, Scope, StaleVector, VectorRow};
use tracing::debug;

use crate::backend::{BackendHit, QueryFilter, VectorBackend};
use crate::error::StoreError;

/// DuckDB vector backend; on-disk when given a path, ephemeral for
/// `:memory:`.
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
    dimensions: usize,
}

/// Format a float slice as a DuckDB array literal: `[0.1, 0.2, ...]`.
fn vec_to_sql(v: &[f32]) -> String {
    let mut s = String::with_capacity(v.len() * 10 + 2);
    s.push('[');
    for (i, x) in v.iter().enumerate() {
        if i > 0 {
            s.push_str(", ");
        }
        let _ = write!(s, "{x}");
    }
    s.push(']');
    s
}

/// Escape LIKE wildcards so a doc-id prefix matches literally.
fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS memory_vectors (
        doc_id           TEXT PRIMARY KEY,
        sqlite_id        BIGINT NOT NULL,
        doc_type         TEXT NOT NULL,
        field_type       TEXT,
        project          TEXT,
        scope            TEXT NOT NULL DEFAULT '',
        created_at_epoch BIGINT,
        obs_type         TEXT,
        extra            TEXT,
        model_version    TEXT NOT NULL,
        embedding        FLOAT[]
    )";

impl DuckDbBackend {
    /// Open (and create the schema in) a database file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the database cannot be opened
    /// or the schema cannot be created.
    pub fn open(path: &Path, dimensions: usize) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), dimensions, "duckdb vector backend opened");
        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    /// Ephemeral in-memory database, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the schema cannot be created.
    pub fn open_in_memory(dimensions: usize) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build the `WHERE` clause and its parameters for a filter.
    fn filter_sql(filter: &QueryFilter) -> (String, Vec<Box<dyn duckdb::ToSql>>) {
        let mut clauses = vec!["embedding IS NOT NULL".to_string()];
        let mut values: Vec<Box<dyn duckdb::ToSql>> = Vec::new();
        if let Some(doc_type) = filter.doc_type {
            clauses.push("doc_type = ?".to_string());
            values.push(Box::new(doc_type.as_str().to_string()));
        }
        if let Some(project) = &filter.project {
            clauses.push("(project = ? OR scope = 'global')".to_string());
            values.push(Box::new(project.clone()));
        }
        (clauses.join(" AND "), values)
    }

    fn run_top_k(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &QueryFilter,
        grouped: bool,
    ) -> Result<Vec<BackendHit>, StoreError> {
        let d = self.dimensions;
        let embedding_sql = vec_to_sql(embedding);
        let (where_sql, params_vec) = Self::filter_sql(filter);

        let inner = format!(
            "SELECT doc_id, sqlite_id, doc_type, field_type, project, scope,
                    created_at_epoch, obs_type, extra,
                    1.0 - array_cosine_similarity(embedding::FLOAT[{d}], '{embedding_sql}'::FLOAT[{d}]) AS distance
             FROM memory_vectors
             WHERE {where_sql}"
        );

        let sql = if grouped {
            format!(
                "SELECT doc_id, sqlite_id, doc_type, field_type, project, scope,
                        created_at_epoch, obs_type, extra, distance
                 FROM (
                     SELECT *, ROW_NUMBER() OVER (
                         PARTITION BY sqlite_id ORDER BY distance ASC, doc_id ASC
                     ) AS rn
                     FROM ({inner})
                 )
                 WHERE rn = 1
                 ORDER BY distance ASC, doc_id ASC
                 LIMIT {k}"
            )
        } else {
            format!("{inner} ORDER BY distance ASC, doc_id ASC LIMIT {k}")
        };

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn duckdb::ToSql> =
            params_vec.iter().map(std::convert::AsRef::as_ref).collect();

        type RawRow = (
            String,
            i64,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<i64>,
            Option<String>,
            Option<String>,
            f64,
        );
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok::<RawRow, duckdb::Error>((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
            ))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (doc_id, sqlite_id, doc_type, field_type, project, scope, created, obs_type, extra, distance) =
                row?;
            let doc_type = DocType::from_str(&doc_type)
                .map_err(|e| StoreError::BackendState(format!("row '{doc_id}': {e}")))?;
            let mut metadata = DocMetadata::new(sqlite_id, doc_type);
            metadata.field_type = field_type;
            metadata.project = project;
            metadata.scope = Scope::from_column(scope.as_deref().unwrap_or(""));
            metadata.created_at_epoch = created;
            metadata.obs_type = obs_type;
            metadata.extra = extra
                .as_deref()
                .map(DocMetadata::parse_extra)
                .unwrap_or_default();
            hits.push(BackendHit {
                doc_id,
                distance,
                metadata,
            });
        }
        Ok(hits)
    }
}

impl VectorBackend for DuckDbBackend {
    fn upsert(&self, rows: &[VectorRow]) -> Result<(), StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "INSERT OR REPLACE INTO memory_vectors (
                doc_id, sqlite_id, doc_type, field_type, project, scope,
                created_at_epoch, obs_type, extra, model_version, embedding
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?::FLOAT[])",
        )?;

        for row in rows {
            if row.embedding.len() != self.dimensions {
                return Err(StoreError::BackendState(format!(
                    "row '{}' has {}-dim embedding, backend expects {}",
                    row.doc_id,
                    row.embedding.len(),
                    self.dimensions
                )));
            }
            let extra = row.metadata.extra_joined();
            stmt.execute(params![
                row.doc_id,
                row.metadata.sqlite_id,
                row.metadata.doc_type.as_str(),
                row.metadata.field_type,
                row.metadata.project,
                row.metadata.scope.as_str(),
                row.metadata.created_at_epoch,
                row.metadata.obs_type,
                if extra.is_empty() { None } else { Some(extra) },
                row.model_version,
                vec_to_sql(&row.embedding),
            ])?;
        }
        Ok(())
    }

    fn delete(&self, doc_ids: &[String]) -> Result<usize, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("DELETE FROM memory_vectors WHERE doc_id = ?")?;
        let mut removed = 0;
        for id in doc_ids {
            removed += stmt.execute(params![id])?;
        }
        Ok(removed)
    }

    fn delete_by_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let pattern = format!("{}%", escape_like(prefix));
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM memory_vectors WHERE doc_id LIKE ? ESCAPE '\\'",
            params![pattern],
        )?;
        Ok(removed)
    }

    fn top_k(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<BackendHit>, StoreError> {
        self.run_top_k(embedding, k, filter, false)
    }

    fn top_k_grouped(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<BackendHit>, StoreError> {
        self.run_top_k(embedding, k, filter, true)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let conn = self.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM memory_vectors", [], |row| row.get(0))?;
        #[allow(clippy::cast_sign_loss)]
        Ok(count as u64)
    }

    fn stale(&self, current_version: &str) -> Result<Vec<StaleVector>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT doc_id, sqlite_id, doc_type, field_type, project, scope
             FROM memory_vectors
             WHERE model_version IS NULL OR model_version <> ?
             ORDER BY doc_id",
        )?;
        type RawRow = (String, i64, String, Option<String>, Option<String>, Option<String>);
        let rows = stmt.query_map(params![current_version], |row| {
            Ok::<RawRow, duckdb::Error>((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?;

        let mut stale = Vec::new();
        for row in rows {
            let (doc_id, sqlite_id, doc_type, field_type, project, scope) = row?;
            let doc_type = DocType::from_str(&doc_type)
                .map_err(|e| StoreError::BackendState(format!("row '{doc_id}': {e}")))?;
            stale.push(StaleVector {
                doc_id,
                sqlite_id,
                doc_type,
                field_type,
                project,
                scope: Scope::from_column(scope.as_deref().unwrap_or("")),
            });
        }
        Ok(stale)
    }

    fn version_counts(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        group_count(&self.lock(), "model_version")
    }

    fn coverage_by_type(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        group_count(&self.lock(), "doc_type")
    }

    fn project_counts(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        group_count(&self.lock(), "project")
    }
}

/// `GROUP BY` count over a single column; NULL keys collapse to `""`.
fn group_count(conn: &Connection, column: &str) -> Result<BTreeMap<String, u64>, StoreError> {
    let sql = format!(
        "SELECT COALESCE({column}, ''), COUNT(*) FROM memory_vectors GROUP BY 1 ORDER BY 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok::<(String, i64), duckdb::Error>((row.get(0)?, row.get(1)?))
    })?;
    let mut counts = BTreeMap::new();
    for row in rows {
        let (key, count) = row?;
        #[allow(clippy::cast_sign_loss)]
        counts.insert(key, count as u64);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    fn row(doc_id: &str, sqlite_id: i64, embedding: Vec<f32>, version: &str) -> VectorRow {
        let mut metadata = DocMetadata::new(sqlite_id, DocType::Observation);
        metadata.field_type = Some("narrative".to_string());
        VectorRow {
            doc_id: doc_id.to_string(),
            embedding,
            metadata,
            model_version: version.to_string(),
        }
    }

    #[test]
    fn upsert_then_self_query_hits_at_zero_distance() {
        let backend = DuckDbBackend::open_in_memory(4).unwrap();
        backend
            .upsert(&[row("a", 1, unit(4, 0), "v1"), row("b", 2, unit(4, 1), "v1")])
            .unwrap();

        let hits = backend.top_k(&unit(4, 0), 10, &QueryFilter::default()).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, "a");
        assert!(hits[0].distance.abs() < 1e-6);
        assert_eq!(hits[0].metadata.field_type.as_deref(), Some("narrative"));
    }

    #[test]
    fn upsert_twice_keeps_one_row_with_latest_embedding() {
        let backend = DuckDbBackend::open_in_memory(4).unwrap();
        backend.upsert(&[row("a", 1, unit(4, 0), "v1")]).unwrap();
        backend.upsert(&[row("a", 1, unit(4, 2), "v1")]).unwrap();

        assert_eq!(backend.count().unwrap(), 1);
        let hits = backend.top_k(&unit(4, 2), 1, &QueryFilter::default()).unwrap();
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let backend = DuckDbBackend::open_in_memory(4).unwrap();
        let err = backend.upsert(&[row("a", 1, vec![1.0, 0.0], "v1")]).unwrap_err();
        assert!(matches!(err, StoreError::BackendState(_)));
    }

    #[test]
    fn doc_type_and_project_filters_apply() {
        let backend = DuckDbBackend::open_in_memory(4).unwrap();
        let mut prompt = row("prompt_1", 10, unit(4, 0), "v1");
        prompt.metadata.doc_type = DocType::UserPrompt;
        let mut local = row("obs_1_narrative", 1, unit(4, 0), "v1");
        local.metadata.project = Some("engram".to_string());
        local.metadata.scope = Scope::Project;
        let mut global = row("obs_2_narrative", 2, unit(4, 0), "v1");
        global.metadata.project = Some("other".to_string());
        global.metadata.scope = Scope::Global;
        let mut foreign = row("obs_3_narrative", 3, unit(4, 0), "v1");
        foreign.metadata.project = Some("other".to_string());
        foreign.metadata.scope = Scope::Project;
        backend.upsert(&[prompt, local, global, foreign]).unwrap();

        let filter = QueryFilter {
            doc_type: Some(DocType::Observation),
            project: Some("engram".to_string()),
        };
        let hits = backend.top_k(&unit(4, 0), 10, &filter).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["obs_1_narrative", "obs_2_narrative"]);
    }

    #[test]
    fn prefix_delete_escapes_like_wildcards() {
        let backend = DuckDbBackend::open_in_memory(4).unwrap();
        backend
            .upsert(&[
                row("obs_1_narrative", 1, unit(4, 0), "v1"),
                row("obs_1_fact_0", 1, unit(4, 1), "v1"),
                row("obs_12_narrative", 12, unit(4, 2), "v1"),
                row("obsX1Y_narrative", 99, unit(4, 3), "v1"),
            ])
            .unwrap();

        let removed = backend.delete_by_prefix("obs_1_").unwrap();
        assert_eq!(removed, 2, "the underscore must not act as a wildcard");
        assert_eq!(backend.count().unwrap(), 2);
    }

    #[test]
    fn stale_and_version_counts_track_model_versions() {
        let backend = DuckDbBackend::open_in_memory(4).unwrap();
        backend
            .upsert(&[
                row("a", 1, unit(4, 0), "v1"),
                row("b", 2, unit(4, 1), "v1"),
                row("c", 3, unit(4, 2), "v2"),
            ])
            .unwrap();

        let stale = backend.stale("v2").unwrap();
        assert_eq!(stale.len(), 2);
        assert_eq!(stale[0].doc_id, "a");

        let counts = backend.version_counts().unwrap();
        assert_eq!(counts["v1"], 2);
        assert_eq!(counts["v2"], 1);
    }

    #[test]
    fn grouped_query_returns_top_row_per_sqlite_id() {
        let backend = DuckDbBackend::open_in_memory(4).unwrap();
        let mut near_fact = row("obs_1_fact_0", 1, unit(4, 1), "v1");
        near_fact.metadata.field_type = Some("fact".to_string());
        backend
            .upsert(&[
                row("obs_1_narrative", 1, unit(4, 0), "v1"),
                near_fact,
                row("obs_2_narrative", 2, unit(4, 1), "v1"),
            ])
            .unwrap();

        let hits = backend
            .top_k_grouped(&unit(4, 0), 10, &QueryFilter::default())
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, "obs_1_narrative");
        assert!(hits.iter().all(|h| h.metadata.sqlite_id != 1 || h.doc_id == "obs_1_narrative"));
    }

    #[test]
    fn extras_round_trip_through_the_joined_column() {
        let backend = DuckDbBackend::open_in_memory(4).unwrap();
        let mut r = row("a", 1, unit(4, 0), "v1");
        r.metadata.extra.insert("lang".to_string(), "rust".to_string());
        backend.upsert(&[r]).unwrap();

        let hits = backend.top_k(&unit(4, 0), 1, &QueryFilter::default()).unwrap();
        assert_eq!(hits[0].metadata.extra["lang"], "rust");
    }
}
