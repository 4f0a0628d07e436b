//! The supervisor's global session registry and statistics snapshot (C8,
//! §4.8), grounded on the workspace's `McpConnectionPool` pattern: a
//! `DashMap`-backed table plus a small stats struct, admin operations going
//! through the table rather than the session tasks directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::error::ServerError;

struct SessionHandle {
    principal_id: String,
    connected_at: Instant,
    close_tx: Option<oneshot::Sender<()>>,
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, SessionHandle>>,
    stats: Arc<ServerStatsInner>,
    started_at: Instant,
}

struct ServerStatsInner {
    total_connections: AtomicU64,
    errors: AtomicU64,
    warnings: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            stats: Arc::new(ServerStatsInner {
                total_connections: AtomicU64::new(0),
                errors: AtomicU64::new(0),
                warnings: AtomicU64::new(0),
            }),
            started_at: Instant::now(),
        }
    }

    /// Register a newly-accepted session, returning the `oneshot::Receiver`
    /// its task should race against its transport read in order to honor
    /// `close_session`.
    pub fn register(&self, session_id: String, principal_id: String) -> oneshot::Receiver<()> {
        let (close_tx, close_rx) = oneshot::channel();
        self.sessions.insert(
            session_id,
            SessionHandle {
                principal_id,
                connected_at: Instant::now(),
                close_tx: Some(close_tx),
            },
        );
        self.stats.total_connections.fetch_add(1, Ordering::Relaxed);
        close_rx
    }

    pub fn unregister(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    pub fn close_session(&self, session_id: &str) -> Result<(), ServerError> {
        let mut entry = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ServerError::UnknownSession(session_id.to_string()))?;
        if let Some(close_tx) = entry.close_tx.take() {
            let _ = close_tx.send(());
        }
        Ok(())
    }

    pub fn record_error(&self) {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_warning(&self) {
        self.stats.warnings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> usize {
        self.sessions.len()
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        self.sessions
            .iter()
            .map(|entry| SessionSummary {
                session_id: entry.key().clone(),
                principal_id: entry.value().principal_id.clone(),
                connected_secs: entry.value().connected_at.elapsed().as_secs(),
            })
            .collect()
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            uptime_secs: self.started_at.elapsed().as_secs(),
            active_connections: self.active_connections(),
            total_connections: self.stats.total_connections.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
            warnings: self.stats.warnings.load(Ordering::Relaxed),
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub principal_id: String,
    pub connected_secs: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ServerStats {
    pub uptime_secs: u64,
    pub active_connections: usize,
    pub total_connections: u64,
    pub errors: u64,
    pub warnings: u64,
}
