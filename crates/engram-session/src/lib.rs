//! # engram-session
//!
//! Session orchestration for Engram: live-session tracking with per-session
//! pending queues and non-blocking wake-up channels, background stale-session
//! cleanup, SSE lifecycle fan-out, and the shared ingest worker that turns
//! queued tool events into vector rows.

pub mod manager;
pub mod sse;
pub mod worker;

pub use manager::{
    LifecycleCallback, PendingMessage, PromptLookup, Session, SessionManager, SessionState,
    spawn_cleanup,
};
pub use sse::{SseBroadcaster, frame, lifecycle_event};
pub use worker::{
    IngestWorker, ObservationSink, observation_documents, pattern_documents, prompt_document,
    summary_documents,
};
