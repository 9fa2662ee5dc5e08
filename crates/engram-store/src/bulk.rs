//! Bulk document import with per-item retry and a cooldown window.
//!
//! Bulk runs retry each document independently and aggregate outcomes
//! instead of failing the batch; a second run inside the cooldown window
//! is rejected with `RateLimited` so rebuild tooling cannot hammer the
//! embedding model.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use engram_core::Document;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::VectorStore;

/// Attempts per document (the initial try plus one retry).
const ATTEMPTS_PER_ITEM: u32 = 2;

/// One failed document in a bulk outcome.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BulkError {
    pub doc_id: String,
    pub error: String,
}

/// Aggregate result of a bulk import run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BulkOutcome {
    pub imported: usize,
    pub failed: usize,
    pub skipped_duplicates: usize,
    pub errors: Vec<BulkError>,
}

/// Rate-limited bulk importer over a [`VectorStore`].
pub struct BulkImporter<'a> {
    store: &'a VectorStore,
    cooldown: Duration,
    last_run: Mutex<Option<Instant>>,
}

impl<'a> BulkImporter<'a> {
    #[must_use]
    pub const fn new(store: &'a VectorStore, cooldown: Duration) -> Self {
        Self {
            store,
            cooldown,
            last_run: Mutex::new(None),
        }
    }

    /// Import documents one by one, retrying each independently.
    ///
    /// Duplicate `doc_id`s within the batch are skipped (first wins).
    /// Individual failures are recorded in the outcome, never propagated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RateLimited`] when called again inside the
    /// cooldown window.
    pub fn import(&self, docs: &[Document]) -> Result<BulkOutcome, StoreError> {
        {
            let mut last_run = self.last_run.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(last) = *last_run {
                let elapsed = last.elapsed();
                if elapsed < self.cooldown {
                    return Err(StoreError::RateLimited {
                        retry_after_secs: (self.cooldown - elapsed).as_secs().max(1),
                    });
                }
            }
            *last_run = Some(Instant::now());
        }

        let mut outcome = BulkOutcome::default();
        let mut seen = std::collections::HashSet::new();

        for doc in docs {
            if !seen.insert(doc.doc_id.clone()) {
                outcome.skipped_duplicates += 1;
                continue;
            }
            match self.import_one(doc) {
                Ok(()) => outcome.imported += 1,
                Err(err) => {
                    warn!(doc_id = %doc.doc_id, error = %err, "bulk item failed");
                    outcome.failed += 1;
                    outcome.errors.push(BulkError {
                        doc_id: doc.doc_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        debug!(
            imported = outcome.imported,
            failed = outcome.failed,
            skipped = outcome.skipped_duplicates,
            "bulk import finished"
        );
        Ok(outcome)
    }

    fn import_one(&self, doc: &Document) -> Result<(), StoreError> {
        let mut last_err = None;
        for attempt in 1..=ATTEMPTS_PER_ITEM {
            match self.store.add_documents(std::slice::from_ref(doc)) {
                Ok(_) => return Ok(()),
                Err(err) => {
                    if attempt < ATTEMPTS_PER_ITEM {
                        debug!(doc_id = %doc.doc_id, attempt, "retrying bulk item");
                    }
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            StoreError::InvalidInput("bulk item failed without an error".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::store::VectorStore;
    use engram_config::CacheConfig;
    use engram_core::{DocMetadata, DocType};
    use engram_embed::HashEmbedder;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn test_store() -> VectorStore {
        VectorStore::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(HashEmbedder::new(64)),
            &CacheConfig::default(),
        )
    }

    fn doc(doc_id: &str, content: &str) -> Document {
        Document {
            doc_id: doc_id.to_string(),
            content: content.to_string(),
            metadata: DocMetadata::new(1, DocType::Observation),
        }
    }

    #[test]
    fn import_counts_and_dedups() {
        let store = test_store();
        let importer = BulkImporter::new(&store, Duration::from_secs(0));

        let outcome = importer
            .import(&[doc("a", "one"), doc("b", "two"), doc("a", "one again")])
            .unwrap();
        assert_eq!(outcome.imported, 2);
        assert_eq!(outcome.skipped_duplicates, 1);
        assert_eq!(outcome.failed, 0);
        assert!(outcome.errors.is_empty());
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn second_run_inside_cooldown_is_rate_limited() {
        let store = test_store();
        let importer = BulkImporter::new(&store, Duration::from_secs(3600));

        importer.import(&[doc("a", "one")]).unwrap();
        let err = importer.import(&[doc("b", "two")]).unwrap_err();
        assert!(matches!(err, StoreError::RateLimited { .. }));
    }

    #[test]
    fn zero_cooldown_allows_back_to_back_runs() {
        let store = test_store();
        let importer = BulkImporter::new(&store, Duration::from_secs(0));
        importer.import(&[doc("a", "one")]).unwrap();
        let outcome = importer.import(&[doc("b", "two")]).unwrap();
        assert_eq!(outcome.imported, 1);
    }
}
