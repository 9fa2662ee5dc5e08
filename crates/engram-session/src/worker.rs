//! The shared ingest worker: drains session queues, extracts observations
//! from tool-event payloads, gates them for secrets, and syncs vectors.
//!
//! Vector sync is fire-and-forget with its own timeout: a slow or failing
//! embedding/store path is logged and never blocks the session flow.

use std::sync::Arc;
use std::time::Duration;

use engram_core::{
    DocMetadata, DocType, Document, Observation, ObservationDraft, Pattern, PatternField, Scope,
    SummaryDraft, SummaryField, ids, sdk,
};
use engram_redact::sanitize_observation;
use engram_store::VectorStore;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::manager::{PendingMessage, SessionManager};

/// External persistence contract for extracted observations (backed by the
/// relational store, which is outside this crate). Returns the new row id.
pub trait ObservationSink: Send + Sync {
    fn persist(&self, session_db_id: i64, draft: &ObservationDraft) -> i64;
}

/// Build the vector documents derived from an observation: one narrative
/// row (when present) and one row per fact.
#[must_use]
pub fn observation_documents(obs: &Observation) -> Vec<Document> {
    let mut metadata = DocMetadata::new(obs.id, DocType::Observation);
    metadata.project = obs.project.clone();
    metadata.scope = obs.scope;
    metadata.created_at_epoch = Some(obs.created_at_epoch);
    metadata.obs_type = Some(obs.obs_type.as_str().to_string());

    let mut docs = Vec::new();
    if let Some(narrative) = &obs.narrative {
        let mut content = String::new();
        if let Some(title) = &obs.title {
            content.push_str(title);
            content.push_str(". ");
        }
        if let Some(subtitle) = &obs.subtitle {
            content.push_str(subtitle);
            content.push_str(". ");
        }
        content.push_str(narrative);

        let mut narrative_meta = metadata.clone();
        narrative_meta.field_type = Some("narrative".to_string());
        docs.push(Document {
            doc_id: ids::observation_narrative(obs.id),
            content,
            metadata: narrative_meta,
        });
    }
    for (index, fact) in obs.facts.iter().enumerate() {
        let mut fact_meta = metadata.clone();
        fact_meta.field_type = Some("fact".to_string());
        docs.push(Document {
            doc_id: ids::observation_fact(obs.id, index),
            content: fact.clone(),
            metadata: fact_meta,
        });
    }
    docs
}

/// Build the vector documents for a session summary: one row per
/// non-empty field.
#[must_use]
pub fn summary_documents(
    summary_id: i64,
    draft: &SummaryDraft,
    project: Option<&str>,
    scope: Scope,
) -> Vec<Document> {
    let mut metadata = DocMetadata::new(summary_id, DocType::SessionSummary);
    metadata.project = project.map(ToString::to_string);
    metadata.scope = scope;

    SummaryField::ALL
        .iter()
        .filter_map(|field| {
            draft.field(*field).map(|content| {
                let mut field_meta = metadata.clone();
                field_meta.field_type = Some(field.as_str().to_string());
                Document {
                    doc_id: ids::summary_field(summary_id, *field),
                    content: content.to_string(),
                    metadata: field_meta,
                }
            })
        })
        .collect()
}

/// Build the vector document for a user prompt.
#[must_use]
pub fn prompt_document(prompt_id: i64, text: &str, project: Option<&str>) -> Document {
    let mut metadata = DocMetadata::new(prompt_id, DocType::UserPrompt);
    metadata.project = project.map(ToString::to_string);
    metadata.field_type = Some("prompt".to_string());
    Document {
        doc_id: ids::user_prompt(prompt_id),
        content: text.to_string(),
        metadata,
    }
}

/// Build the vector documents for a pattern: one row per non-empty field.
#[must_use]
pub fn pattern_documents(pattern: &Pattern) -> Vec<Document> {
    let mut metadata = DocMetadata::new(pattern.id, DocType::Pattern);
    metadata.project = pattern.project.clone();
    metadata.scope = pattern.scope;
    metadata.created_at_epoch = Some(pattern.created_at_epoch);

    [
        PatternField::Name,
        PatternField::Description,
        PatternField::Recommendation,
    ]
    .iter()
    .filter_map(|field| {
        pattern.field(*field).map(|content| {
            let mut field_meta = metadata.clone();
            field_meta.field_type = Some(field.as_str().to_string());
            Document {
                doc_id: ids::pattern_field(pattern.id, *field),
                content: content.to_string(),
                metadata: field_meta,
            }
        })
    })
    .collect()
}

/// Shared ingest worker over the session manager and the vector store.
pub struct IngestWorker {
    manager: Arc<SessionManager>,
    store: Arc<VectorStore>,
    sink: Arc<dyn ObservationSink>,
    sync_timeout: Duration,
}

impl IngestWorker {
    #[must_use]
    pub fn new(
        manager: Arc<SessionManager>,
        store: Arc<VectorStore>,
        sink: Arc<dyn ObservationSink>,
        sync_timeout: Duration,
    ) -> Self {
        Self {
            manager,
            store,
            sink,
            sync_timeout,
        }
    }

    /// Drain and process one session's queue. Returns how many messages
    /// were handled; failures are logged, never propagated.
    pub async fn process_session(&self, session_db_id: i64) -> usize {
        let project = self
            .manager
            .get(session_db_id)
            .and_then(|s| s.state().project);
        let messages = self.manager.drain_messages(session_db_id);
        let handled = messages.len();

        for message in messages {
            match message {
                PendingMessage::Observation { data } => {
                    self.handle_observation(session_db_id, project.as_deref(), &data)
                        .await;
                }
                PendingMessage::Summarize { .. } => {
                    // Summary generation belongs to the SDK generator; the
                    // queue entry only pins the session until it runs.
                    debug!(session_db_id, "summarize job handed to generator");
                }
            }
        }
        handled
    }

    async fn handle_observation(&self, session_db_id: i64, project: Option<&str>, data: &Value) {
        let Some(text) = data.get("text").and_then(Value::as_str).or_else(|| data.as_str()) else {
            warn!(session_db_id, "observation payload without text field");
            return;
        };

        let drafts = match sdk::extract_observations(text) {
            Ok(drafts) => drafts,
            Err(err) => {
                warn!(session_db_id, error = %err, "malformed observation payload dropped");
                return;
            }
        };

        for draft in drafts {
            // Secret gate: a single hit drops the whole observation before
            // anything is persisted or embedded.
            if sanitize_observation(draft.narrative.as_deref(), &draft.facts) {
                warn!(session_db_id, "observation dropped by secret gate");
                continue;
            }

            let obs_id = self.sink.persist(session_db_id, &draft);
            let mut obs = Observation::from_draft(obs_id, draft);
            obs.project = project.map(ToString::to_string);
            if obs.project.is_some() {
                obs.scope = Scope::Project;
            }

            self.sync_vectors(observation_documents(&obs)).await;
        }
    }

    /// Sync a completed session summary into the vector store. Called by
    /// the generator once the SDK produces the summary block.
    pub async fn sync_summary(
        &self,
        summary_id: i64,
        draft: &SummaryDraft,
        project: Option<&str>,
        scope: Scope,
    ) {
        self.sync_vectors(summary_documents(summary_id, draft, project, scope))
            .await;
    }

    /// Sync a user prompt into the vector store.
    pub async fn sync_prompt(&self, prompt_id: i64, text: &str, project: Option<&str>) {
        if text.trim().is_empty() {
            return;
        }
        self.sync_vectors(vec![prompt_document(prompt_id, text, project)])
            .await;
    }

    /// Sync a promoted pattern into the vector store.
    pub async fn sync_pattern(&self, pattern: &Pattern) {
        self.sync_vectors(pattern_documents(pattern)).await;
    }

    /// Fire-and-forget vector sync bounded by `sync_timeout`; errors are
    /// logged and never block the session.
    async fn sync_vectors(&self, docs: Vec<Document>) {
        if docs.is_empty() {
            return;
        }
        let store = Arc::clone(&self.store);
        let count = docs.len();
        let task = tokio::task::spawn_blocking(move || store.add_documents(&docs));
        match tokio::time::timeout(self.sync_timeout, task).await {
            Ok(Ok(Ok(written))) => debug!(written, "vector sync complete"),
            Ok(Ok(Err(err))) => warn!(error = %err, count, "vector sync failed"),
            Ok(Err(join_err)) => warn!(error = %join_err, count, "vector sync task panicked"),
            Err(_) => warn!(count, "vector sync timed out"),
        }
    }

    /// Worker loop: wake on the process-notify edge, drain every session
    /// with pending work, exit on manager shutdown.
    pub async fn run(&self, mut process_rx: mpsc::Receiver<()>) {
        let mut shutdown = self.manager.shutdown_signal();
        loop {
            tokio::select! {
                received = process_rx.recv() => {
                    if received.is_none() {
                        break;
                    }
                    for session_db_id in self.manager.sessions_with_pending() {
                        self.process_session(session_db_id).await;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_config::{CacheConfig, SessionConfig};
    use engram_core::ObservationType;
    use engram_embed::HashEmbedder;
    use engram_store::MemoryBackend;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct CountingSink {
        next_id: AtomicI64,
    }

    impl CountingSink {
        fn new() -> Self {
            Self {
                next_id: AtomicI64::new(0),
            }
        }
        fn persisted(&self) -> i64 {
            self.next_id.load(Ordering::SeqCst)
        }
    }

    impl ObservationSink for CountingSink {
        fn persist(&self, _session_db_id: i64, _draft: &ObservationDraft) -> i64 {
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        }
    }

    fn test_worker() -> (Arc<SessionManager>, Arc<VectorStore>, Arc<CountingSink>, IngestWorker) {
        let manager = Arc::new(SessionManager::new(SessionConfig::default()));
        let store = Arc::new(VectorStore::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(HashEmbedder::new(64)),
            &CacheConfig::default(),
        ));
        let sink = Arc::new(CountingSink::new());
        let worker = IngestWorker::new(
            Arc::clone(&manager),
            Arc::clone(&store),
            Arc::clone(&sink) as Arc<dyn ObservationSink>,
            Duration::from_secs(5),
        );
        (manager, store, sink, worker)
    }

    #[test]
    fn observation_documents_cover_narrative_and_facts() {
        let mut obs = Observation::new(9, ObservationType::Bugfix);
        obs.title = Some("JWT expiry".to_string());
        obs.narrative = Some("Fixed expired-token handling".to_string());
        obs.facts = vec!["exp claim was ignored".to_string(), "skew allowed".to_string()];

        let docs = observation_documents(&obs);
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].doc_id, "obs_9_narrative");
        assert!(docs[0].content.starts_with("JWT expiry. "));
        assert_eq!(docs[1].doc_id, "obs_9_fact_0");
        assert_eq!(docs[2].doc_id, "obs_9_fact_1");
        assert_eq!(docs[0].metadata.obs_type.as_deref(), Some("bugfix"));
        assert_eq!(docs[1].metadata.field_type.as_deref(), Some("fact"));
    }

    #[test]
    fn summary_documents_skip_empty_fields() {
        let draft = SummaryDraft {
            request: Some("add caching".to_string()),
            learned: Some("ttl sweep suffices".to_string()),
            ..SummaryDraft::default()
        };
        let docs = summary_documents(3, &draft, Some("engram"), Scope::Project);
        let doc_ids: Vec<&str> = docs.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(doc_ids, vec!["summary_3_request", "summary_3_learned"]);
        assert!(docs.iter().all(|d| d.metadata.doc_type == DocType::SessionSummary));
    }

    #[test]
    fn prompt_document_uses_the_prompt_template() {
        let doc = prompt_document(12, "how do we retry?", None);
        assert_eq!(doc.doc_id, "prompt_12");
        assert_eq!(doc.metadata.doc_type, DocType::UserPrompt);
        assert_eq!(doc.metadata.field_type.as_deref(), Some("prompt"));
    }

    #[test]
    fn pattern_documents_cover_non_empty_fields() {
        let pattern = Pattern {
            id: 4,
            name: "retry with jitter".to_string(),
            description: "add randomized backoff to retry loops".to_string(),
            recommendation: Some("cap total retry time".to_string()),
            created_at_epoch: 1_750_000_000_000,
            scope: Scope::Global,
            project: None,
        };
        let docs = pattern_documents(&pattern);
        let doc_ids: Vec<&str> = docs.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(
            doc_ids,
            vec!["pattern_4_name", "pattern_4_description", "pattern_4_recommendation"]
        );
        assert!(docs.iter().all(|d| d.metadata.doc_type == DocType::Pattern));
        assert!(docs.iter().all(|d| d.metadata.scope == Scope::Global));
    }

    #[tokio::test]
    async fn summary_and_prompt_sync_paths_write_rows() {
        let (_manager, store, _sink, worker) = test_worker();

        let draft = SummaryDraft {
            request: Some("speed up search".to_string()),
            completed: Some("added a result cache".to_string()),
            ..SummaryDraft::default()
        };
        worker.sync_summary(11, &draft, Some("engram"), Scope::Project).await;
        worker.sync_prompt(12, "why is search slow", Some("engram")).await;
        worker.sync_prompt(13, "   ", Some("engram")).await;

        assert_eq!(store.count().unwrap(), 3, "two summary fields + one prompt");
    }

    #[tokio::test]
    async fn worker_extracts_and_syncs_observations() {
        let (manager, store, sink, worker) = test_worker();
        manager.queue_observation(
            42,
            json!({
                "text": "<observation><type>bugfix</type>\
                         <narrative>Fixed JWT validation for expired tokens</narrative>\
                         <facts><fact>exp claim was ignored</fact></facts>\
                         </observation>"
            }),
        );

        let handled = worker.process_session(42).await;
        assert_eq!(handled, 1);
        assert_eq!(sink.persisted(), 1);
        assert_eq!(store.count().unwrap(), 2, "narrative + one fact");
        assert!(manager.drain_messages(42).is_empty());
    }

    #[tokio::test]
    async fn secret_observation_is_dropped_before_persistence() {
        let (manager, store, sink, worker) = test_worker();
        manager.queue_observation(
            42,
            json!({
                "text": "<observation><type>change</type>\
                         <narrative>set api_key=abc123def456ghi789jkl012mno345</narrative>\
                         <facts><fact>ok</fact></facts>\
                         </observation>"
            }),
        );

        worker.process_session(42).await;
        assert_eq!(sink.persisted(), 0, "gate fires before the sink");
        assert_eq!(store.count().unwrap(), 0, "no vector row is created");
    }

    #[tokio::test]
    async fn malformed_payloads_are_logged_and_skipped() {
        let (manager, store, _sink, worker) = test_worker();
        manager.queue_observation(42, json!({ "no_text": true }));
        manager.queue_observation(42, json!({ "text": "<observation><type>bugfix</type>" }));

        let handled = worker.process_session(42).await;
        assert_eq!(handled, 2);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn run_loop_drains_on_notify_and_exits_on_shutdown() {
        let (manager, store, _sink, worker) = test_worker();
        let process_rx = manager.take_process_notify_rx().unwrap();

        let worker = Arc::new(worker);
        let run_handle = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.run(process_rx).await })
        };

        manager.queue_observation(
            7,
            json!({
                "text": "<observation><type>discovery</type>\
                         <narrative>retry loops need jitter</narrative>\
                         </observation>"
            }),
        );

        // Give the worker a few ticks to wake and drain.
        for _ in 0..50 {
            if store.count().unwrap() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.count().unwrap(), 1);

        manager.shutdown_all();
        run_handle.await.unwrap();
    }
}
