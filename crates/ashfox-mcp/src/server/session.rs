//! Session lifecycle and SSE attachment.
//!
//! A session ties an MCP client's requests and streams together and owns the
//! project state. Sessions are pruned when idle beyond the TTL, but never
//! while a live SSE stream is attached.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::response::sse::Event;
use tokio::sync::{RwLock, broadcast};

use crate::config::{Limits, protocol};
use crate::metrics::Metrics;
use crate::model::ProjectStore;

/// Broadcast buffer per session.
const EVENT_BUFFER: usize = 64;

/// A server-originated SSE event.
#[derive(Clone, Debug)]
pub struct SessionEvent {
    /// Monotonically increasing per session.
    pub id: u64,
    /// Event name, e.g. "tool_registry_changed".
    pub event: String,
    /// JSON payload.
    pub data: String,
}

impl SessionEvent {
    /// Convert to an axum SSE event.
    #[must_use]
    pub fn to_sse_event(&self) -> Event {
        Event::default().id(self.id.to_string()).event(self.event.clone()).data(self.data.clone())
    }
}

/// A single MCP session.
pub struct Session {
    /// Opaque 128-bit hex identifier.
    pub id: String,
    /// Negotiated protocol version.
    protocol_version: RwLock<String>,
    initialized: AtomicBool,
    /// When the session was created.
    pub created_at: Instant,
    last_active: RwLock<Instant>,
    /// The session's project state.
    pub project: Arc<ProjectStore>,
    tx: broadcast::Sender<SessionEvent>,
    next_event_id: AtomicU64,
    sse_active: AtomicUsize,
    principal: RwLock<Option<String>>,
}

impl Session {
    fn new(id: String, protocol_version: String, project: Arc<ProjectStore>) -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            id,
            protocol_version: RwLock::new(protocol_version),
            initialized: AtomicBool::new(false),
            created_at: Instant::now(),
            last_active: RwLock::new(Instant::now()),
            project,
            tx,
            next_event_id: AtomicU64::new(1),
            sse_active: AtomicUsize::new(0),
            principal: RwLock::new(None),
        }
    }

    /// Negotiated protocol version.
    pub async fn protocol_version(&self) -> String {
        self.protocol_version.read().await.clone()
    }

    /// Mark the handshake complete.
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Bind the resolved principal's fingerprint.
    pub async fn bind_principal(&self, fingerprint: String) {
        *self.principal.write().await = Some(fingerprint);
    }

    pub async fn principal(&self) -> Option<String> {
        self.principal.read().await.clone()
    }

    /// Update the last-activity timestamp.
    pub async fn touch(&self) {
        *self.last_active.write().await = Instant::now();
    }

    /// Shift the last-activity timestamp backwards; used to exercise pruning.
    pub async fn backdate(&self, by: Duration) {
        let mut last_active = self.last_active.write().await;
        *last_active = Instant::now() - by;
    }

    /// How long the session has been idle.
    pub async fn idle_for(&self) -> Duration {
        self.last_active.read().await.elapsed()
    }

    /// Broadcast a server-originated event to every attached stream.
    pub fn notify(&self, event: impl Into<String>, data: impl Into<String>) -> u64 {
        let id = self.next_event_id.fetch_add(1, Ordering::SeqCst);
        let event = SessionEvent { id, event: event.into(), data: data.into() };
        let _ = self.tx.send(event);
        id
    }

    /// Subscribe to live events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Attach an SSE stream; the returned guard detaches on drop.
    #[must_use]
    pub fn attach_sse(self: &Arc<Self>, metrics: Arc<Metrics>) -> SseGuard {
        self.sse_active.fetch_add(1, Ordering::SeqCst);
        metrics.sse_opened();
        SseGuard { session: Arc::clone(self), metrics }
    }

    /// Whether at least one SSE stream is attached.
    #[must_use]
    pub fn has_live_sse(&self) -> bool {
        self.sse_active.load(Ordering::SeqCst) > 0
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Detaches the SSE stream when the connection closes.
pub struct SseGuard {
    session: Arc<Session>,
    metrics: Arc<Metrics>,
}

impl Drop for SseGuard {
    fn drop(&mut self) {
        self.session.sse_active.fetch_sub(1, Ordering::SeqCst);
        self.metrics.sse_closed();
    }
}

/// Global session registry.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    ttl: Duration,
    require_revision: bool,
    limits: Limits,
    last_prune: std::sync::Mutex<Instant>,
}

impl SessionStore {
    /// Create a store. A zero TTL disables pruning.
    #[must_use]
    pub fn new(ttl: Duration, require_revision: bool, limits: Limits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            require_revision,
            limits,
            last_prune: std::sync::Mutex::new(Instant::now()),
        }
    }

    /// Mint a session with a fresh 128-bit hex id.
    pub async fn create(&self, protocol_version: &str, initialized: bool) -> Arc<Session> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let project = Arc::new(ProjectStore::new(self.require_revision, self.limits));
        let session = Arc::new(Session::new(id.clone(), protocol_version.to_string(), project));
        if initialized {
            session.mark_initialized();
        }
        self.sessions.write().await.insert(id, Arc::clone(&session));
        tracing::debug!(session_id = %session.id, initialized, "created session");
        session
    }

    /// Look up a session and touch it.
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(id).cloned();
        if let Some(session) = &session {
            session.touch().await;
        }
        session
    }

    /// Remove a session.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::debug!(session_id = %id, "removed session");
        }
        removed
    }

    /// Current session count.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Broadcast an event to every session.
    pub async fn broadcast(&self, event: &str, data: &str) {
        for session in self.sessions.read().await.values() {
            session.notify(event, data);
        }
    }

    /// Prune at most once per prune interval; called on request arrival.
    pub async fn maybe_prune(&self) {
        if self.ttl.is_zero() {
            return;
        }
        let due = self
            .last_prune
            .lock()
            .map(|mut last| {
                if last.elapsed() >= protocol::PRUNE_INTERVAL {
                    *last = Instant::now();
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if due {
            let pruned = self.prune_idle().await;
            if pruned > 0 {
                tracing::debug!(count = pruned, "pruned idle sessions");
            }
        }
    }

    /// Remove sessions idle beyond the TTL with no live SSE stream.
    pub async fn prune_idle(&self) -> usize {
        if self.ttl.is_zero() {
            return 0;
        }
        let mut doomed = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                if session.has_live_sse() {
                    continue;
                }
                if session.idle_for().await > self.ttl {
                    doomed.push(id.clone());
                }
            }
        }
        let count = doomed.len();
        if count > 0 {
            let mut sessions = self.sessions.write().await;
            for id in doomed {
                sessions.remove(&id);
                tracing::debug!(session_id = %id, "pruned idle session");
            }
        }
        count
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").field("ttl", &self.ttl).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl: Duration) -> SessionStore {
        SessionStore::new(ttl, true, Limits::default())
    }

    #[tokio::test]
    async fn test_session_id_is_128_bit_hex() {
        let store = store(Duration::from_secs(60));
        let session = store.create(protocol::DEFAULT_VERSION, false).await;
        assert_eq!(session.id.len(), 32);
        assert!(session.id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_prune_removes_idle_sessions() {
        let store = store(Duration::from_secs(60));
        let session = store.create(protocol::DEFAULT_VERSION, true).await;
        session.backdate(Duration::from_secs(120)).await;
        assert_eq!(store.prune_idle().await, 1);
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_live_sse_blocks_pruning() {
        let store = store(Duration::from_secs(60));
        let session = store.create(protocol::DEFAULT_VERSION, true).await;
        let metrics = Arc::new(Metrics::new());
        let guard = session.attach_sse(metrics);
        session.backdate(Duration::from_secs(120)).await;

        assert_eq!(store.prune_idle().await, 0);
        assert_eq!(store.count().await, 1);

        drop(guard);
        assert_eq!(store.prune_idle().await, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_pruning() {
        let store = store(Duration::ZERO);
        let session = store.create(protocol::DEFAULT_VERSION, true).await;
        session.backdate(Duration::from_secs(10_000)).await;
        assert_eq!(store.prune_idle().await, 0);
    }

    #[tokio::test]
    async fn test_notify_reaches_subscriber() {
        let store = store(Duration::from_secs(60));
        let session = store.create(protocol::DEFAULT_VERSION, true).await;
        let mut rx = session.subscribe();
        session.notify("tool_registry_changed", "{}");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "tool_registry_changed");
        assert_eq!(event.id, 1);
    }
}
