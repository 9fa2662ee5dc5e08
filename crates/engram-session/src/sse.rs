//! Server-sent-event fan-out for session lifecycle events.
//!
//! The broadcaster is transport-agnostic: it produces ready-to-write
//! `data: <json>\n\n` frames into per-client unbounded channels; the HTTP
//! layer owns the actual socket. Dead clients (closed receivers) are
//! collected during a broadcast pass and removed after it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

struct SseClient {
    id: String,
    tx: mpsc::UnboundedSender<String>,
}

/// Fan-out of JSON events to connected SSE clients.
#[derive(Default)]
pub struct SseBroadcaster {
    clients: RwLock<Vec<SseClient>>,
    next_id: AtomicU64,
}

/// Wrap a JSON payload in an SSE data frame.
#[must_use]
pub fn frame(event: &Value) -> String {
    format!("data: {event}\n\n")
}

impl SseBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. The first frame on the returned channel is the
    /// `connected` greeting carrying the assigned client id.
    #[must_use]
    pub fn subscribe(&self) -> (String, mpsc::UnboundedReceiver<String>) {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("client-{n}");
        let (tx, rx) = mpsc::unbounded_channel();

        let greeting = frame(&json!({ "type": "connected", "clientId": id }));
        let _ = tx.send(greeting);

        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.push(SseClient { id: id.clone(), tx });
        debug!(client_id = %id, "sse client connected");
        (id, rx)
    }

    /// Drop a client explicitly (transport saw the socket close).
    pub fn unsubscribe(&self, client_id: &str) {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.retain(|c| c.id != client_id);
    }

    /// Send an event to every client. Clients whose channel is closed are
    /// removed after the iteration completes, never during it.
    pub fn broadcast(&self, event: &Value) {
        let payload = frame(event);
        let dead: Vec<String> = {
            let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
            clients
                .iter()
                .filter(|client| client.tx.send(payload.clone()).is_err())
                .map(|client| client.id.clone())
                .collect()
        };
        if !dead.is_empty() {
            let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
            clients.retain(|c| !dead.contains(&c.id));
            debug!(removed = dead.len(), "dead sse clients removed");
        }
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Canonical lifecycle event payload.
#[must_use]
pub fn lifecycle_event(kind: &str, session_db_id: i64) -> Value {
    json!({ "type": kind, "session_db_id": session_db_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_frame_is_the_connected_greeting() {
        let broadcaster = SseBroadcaster::new();
        let (id, mut rx) = broadcaster.subscribe();
        assert_eq!(id, "client-1");

        let greeting = rx.try_recv().unwrap();
        assert_eq!(greeting, "data: {\"clientId\":\"client-1\",\"type\":\"connected\"}\n\n");
    }

    #[test]
    fn broadcast_reaches_every_live_client() {
        let broadcaster = SseBroadcaster::new();
        let (_, mut rx1) = broadcaster.subscribe();
        let (_, mut rx2) = broadcaster.subscribe();
        let _ = rx1.try_recv();
        let _ = rx2.try_recv();

        broadcaster.broadcast(&lifecycle_event("session_created", 42));
        let expected = "data: {\"session_db_id\":42,\"type\":\"session_created\"}\n\n";
        assert_eq!(rx1.try_recv().unwrap(), expected);
        assert_eq!(rx2.try_recv().unwrap(), expected);
    }

    #[test]
    fn dead_clients_are_removed_after_the_pass() {
        let broadcaster = SseBroadcaster::new();
        let (_, rx1) = broadcaster.subscribe();
        let (_, mut rx2) = broadcaster.subscribe();
        drop(rx1);

        broadcaster.broadcast(&lifecycle_event("session_deleted", 1));
        assert_eq!(broadcaster.client_count(), 1);
        let _ = rx2.try_recv(); // greeting
        assert!(rx2.try_recv().unwrap().contains("session_deleted"));
    }

    #[test]
    fn unsubscribe_removes_the_client() {
        let broadcaster = SseBroadcaster::new();
        let (id, _rx) = broadcaster.subscribe();
        broadcaster.unsubscribe(&id);
        assert_eq!(broadcaster.client_count(), 0);
    }
}
