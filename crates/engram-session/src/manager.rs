//! Live-session tracking and per-session work queues.
//!
//! The manager owns a map of active sessions keyed by their relational row
//! id. Each session carries an explicit pending-message queue under its own
//! lock plus a capacity-1 wake-up channel; channel sends are non-blocking
//! and dropped when full because the channel is an edge signal, not a
//! queue. A global `process_notify` channel wakes the shared worker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use engram_config::SessionConfig;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// A queued unit of work attached to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingMessage {
    /// A tool-use event payload awaiting observation extraction.
    Observation { data: Value },
    /// A summarization job for the turn's prompt/response pair.
    Summarize {
        user_prompt: String,
        assistant_summary: String,
    },
}

/// Mutable per-session fields, guarded by the session's own lock.
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    pub claude_session_id: String,
    pub sdk_session_id: Option<String>,
    pub project: Option<String>,
    pub user_prompt: String,
    pub last_prompt_number: i64,
}

/// One live session.
pub struct Session {
    db_id: i64,
    start_time: Instant,
    started_at_epoch_ms: i64,
    state: Mutex<SessionState>,
    pending: Mutex<Vec<PendingMessage>>,
    notify_tx: mpsc::Sender<()>,
    notify_rx: Mutex<Option<mpsc::Receiver<()>>>,
    cancel_tx: watch::Sender<bool>,
    generator_active: AtomicBool,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl Session {
    fn new(db_id: i64, user_prompt: String, last_prompt_number: i64) -> Self {
        let (notify_tx, notify_rx) = mpsc::channel(1);
        let (cancel_tx, _) = watch::channel(false);
        Self {
            db_id,
            start_time: Instant::now(),
            started_at_epoch_ms: chrono::Utc::now().timestamp_millis(),
            state: Mutex::new(SessionState {
                user_prompt,
                last_prompt_number,
                ..SessionState::default()
            }),
            pending: Mutex::new(Vec::new()),
            notify_tx,
            notify_rx: Mutex::new(Some(notify_rx)),
            cancel_tx,
            generator_active: AtomicBool::new(false),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn db_id(&self) -> i64 {
        self.db_id
    }

    #[must_use]
    pub const fn started_at_epoch_ms(&self) -> i64 {
        self.started_at_epoch_ms
    }

    /// Snapshot of the mutable state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mutate state under the session lock.
    pub fn update_state(&self, f: impl FnOnce(&mut SessionState)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }

    /// Append to the pending queue and fire the wake-up edge.
    /// Never blocks, never drops the message.
    pub fn enqueue(&self, message: PendingMessage) {
        {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.push(message);
        }
        self.notify();
    }

    /// Non-blocking wake-up; a full channel means a signal is already
    /// pending, so the drop is intentional.
    pub fn notify(&self) {
        let _ = self.notify_tx.try_send(());
    }

    /// Take the session's notify receiver; only one worker may hold it.
    #[must_use]
    pub fn take_notify_rx(&self) -> Option<mpsc::Receiver<()>> {
        self.notify_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Atomically return and clear the pending queue, in insertion order.
    #[must_use]
    pub fn drain(&self) -> Vec<PendingMessage> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending)
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Watch handle observing this session's cancellation.
    #[must_use]
    pub fn cancelled(&self) -> watch::Receiver<bool> {
        self.cancel_tx.subscribe()
    }

    fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn set_generator_active(&self, active: bool) {
        self.generator_active.store(active, Ordering::SeqCst);
    }

    #[must_use]
    pub fn generator_active(&self) -> bool {
        self.generator_active.load(Ordering::SeqCst)
    }

    /// Accumulate token usage reported by the SDK.
    pub fn record_tokens(&self, input: u64, output: u64) {
        self.input_tokens.fetch_add(input, Ordering::Relaxed);
        self.output_tokens.fetch_add(output, Ordering::Relaxed);
    }

    #[must_use]
    pub fn token_totals(&self) -> (u64, u64) {
        (
            self.input_tokens.load(Ordering::Relaxed),
            self.output_tokens.load(Ordering::Relaxed),
        )
    }
}

/// Callback fired on session lifecycle transitions, outside the map lock.
pub type LifecycleCallback = Arc<dyn Fn(i64) + Send + Sync>;

/// External prompt lookup used when `initialize_session` receives an empty
/// prompt for an unknown session (backed by the relational session store).
pub type PromptLookup = Arc<dyn Fn(i64) -> Option<String> + Send + Sync>;

/// Tracks live sessions and their queues.
pub struct SessionManager {
    sessions: RwLock<HashMap<i64, Arc<Session>>>,
    config: SessionConfig,
    process_notify_tx: mpsc::Sender<()>,
    process_notify_rx: Mutex<Option<mpsc::Receiver<()>>>,
    on_created: Mutex<Option<LifecycleCallback>>,
    on_deleted: Mutex<Option<LifecycleCallback>>,
    prompt_lookup: Mutex<Option<PromptLookup>>,
    shutdown_tx: watch::Sender<bool>,
}

impl SessionManager {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let (process_notify_tx, process_notify_rx) = mpsc::channel(1);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            process_notify_tx,
            process_notify_rx: Mutex::new(Some(process_notify_rx)),
            on_created: Mutex::new(None),
            on_deleted: Mutex::new(None),
            prompt_lookup: Mutex::new(None),
            shutdown_tx,
        }
    }

    pub fn set_on_created(&self, callback: LifecycleCallback) {
        *self.on_created.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub fn set_on_deleted(&self, callback: LifecycleCallback) {
        *self.on_deleted.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub fn set_prompt_lookup(&self, lookup: PromptLookup) {
        *self.prompt_lookup.lock().unwrap_or_else(PoisonError::into_inner) = Some(lookup);
    }

    /// Take the global process-notify receiver; only one worker may hold it.
    #[must_use]
    pub fn take_process_notify_rx(&self) -> Option<mpsc::Receiver<()>> {
        self.process_notify_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Create or update a session.
    ///
    /// When the session exists, `user_prompt` and `last_prompt_number` are
    /// updated only for a non-empty prompt. When it does not, an empty
    /// prompt falls back to the external session store (if a lookup is
    /// configured). Insertion is double-checked under the write lock so a
    /// race cannot create two sessions; `on_created` fires outside the
    /// map lock.
    pub fn initialize_session(
        &self,
        session_db_id: i64,
        prompt: &str,
        prompt_number: i64,
    ) -> Arc<Session> {
        if let Some(existing) = self.get(session_db_id) {
            if !prompt.is_empty() {
                existing.update_state(|state| {
                    state.user_prompt = prompt.to_string();
                    state.last_prompt_number = prompt_number;
                });
            }
            return existing;
        }

        let resolved_prompt = if prompt.is_empty() {
            let lookup = self
                .prompt_lookup
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            lookup.and_then(|f| f(session_db_id)).unwrap_or_default()
        } else {
            prompt.to_string()
        };

        let created = Arc::new(Session::new(session_db_id, resolved_prompt, prompt_number));
        let (session, inserted) = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            match sessions.get(&session_db_id) {
                // Lost the race; the winner's session stands.
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    sessions.insert(session_db_id, Arc::clone(&created));
                    (created, true)
                }
            }
        };

        if inserted {
            info!(session_db_id, "session initialized");
            self.fire(&self.on_created, session_db_id);
        } else if !prompt.is_empty() {
            session.update_state(|state| {
                state.user_prompt = prompt.to_string();
                state.last_prompt_number = prompt_number;
            });
        }
        session
    }

    /// Queue a tool-use observation payload; auto-initializes the session.
    pub fn queue_observation(&self, session_db_id: i64, data: Value) {
        let session = self.initialize_session(session_db_id, "", 0);
        session.enqueue(PendingMessage::Observation { data });
        self.notify_process();
        debug!(session_db_id, "observation queued");
    }

    /// Queue a summarization job; auto-initializes the session.
    pub fn queue_summarize(
        &self,
        session_db_id: i64,
        user_prompt: String,
        assistant_summary: String,
    ) {
        let session = self.initialize_session(session_db_id, "", 0);
        session.enqueue(PendingMessage::Summarize {
            user_prompt,
            assistant_summary,
        });
        self.notify_process();
        debug!(session_db_id, "summarize queued");
    }

    /// Atomically return and clear a session's pending queue.
    #[must_use]
    pub fn drain_messages(&self, session_db_id: i64) -> Vec<PendingMessage> {
        self.get(session_db_id).map_or_else(Vec::new, |s| s.drain())
    }

    /// Remove and cancel a session; idempotent. `on_deleted` fires outside
    /// the map lock.
    pub fn delete_session(&self, session_db_id: i64) {
        let removed = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            sessions.remove(&session_db_id)
        };
        if let Some(session) = removed {
            session.cancel();
            info!(session_db_id, "session deleted");
            self.fire(&self.on_deleted, session_db_id);
        }
    }

    /// Cancel the cleanup task and delete every session.
    pub fn shutdown_all(&self) {
        let _ = self.shutdown_tx.send(true);
        let ids: Vec<i64> = {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            sessions.keys().copied().collect()
        };
        for id in ids {
            self.delete_session(id);
        }
    }

    #[must_use]
    pub fn get(&self, session_db_id: i64) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_db_id)
            .cloned()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Ids of sessions with queued work, for the shared worker.
    #[must_use]
    pub fn sessions_with_pending(&self) -> Vec<i64> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<i64> = sessions
            .values()
            .filter(|s| s.pending_len() > 0)
            .map(|s| s.db_id())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Watch handle observing manager shutdown.
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    fn notify_process(&self) {
        let _ = self.process_notify_tx.try_send(());
    }

    fn fire(&self, slot: &Mutex<Option<LifecycleCallback>>, session_db_id: i64) {
        let callback = slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(callback) = callback {
            callback(session_db_id);
        }
    }

    /// One cleanup pass: evict sessions idle past the timeout that have no
    /// pending messages and no active generator. Returns evicted ids.
    pub fn cleanup_stale(&self) -> Vec<i64> {
        let timeout = std::time::Duration::from_secs(self.config.session_timeout_secs);
        let stale: Vec<i64> = {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            sessions
                .values()
                .filter(|s| {
                    s.start_time.elapsed() > timeout
                        && s.pending_len() == 0
                        && !s.generator_active()
                })
                .map(|s| s.db_id())
                .collect()
        };
        for id in &stale {
            debug!(session_db_id = id, "evicting stale session");
            self.delete_session(*id);
        }
        stale
    }
}

/// Background cleanup task. Runs [`SessionManager::cleanup_stale`] every
/// `cleanup_interval`, exits on the manager's shutdown signal. Errors
/// cannot occur; the loop only logs its evictions.
pub fn spawn_cleanup(manager: Arc<SessionManager>) -> tokio::task::JoinHandle<()> {
    let mut shutdown = manager.shutdown_signal();
    let interval = std::time::Duration::from_secs(manager.config.cleanup_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The immediate first tick would evict nothing; consume it.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = manager.cleanup_stale();
                    if !evicted.is_empty() {
                        info!(count = evicted.len(), "stale sessions evicted");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
