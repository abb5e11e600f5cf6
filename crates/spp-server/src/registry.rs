//! SessionRegistry — the concurrency-safe directory of live sessions.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use spp_protocol::SppNotification;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::session::{Session, SessionId};

/// Observer of session lifecycle. Observers run synchronously, in
/// registration order, outside the registry lock — a slow observer delays
/// subsequent registrations but never blocks lookups or deliveries.
pub trait SessionObserver: Send + Sync {
    fn on_register(&self, session: &Session);
    fn on_unregister(&self, session: &Session);
}

/// Registry capacity and per-session queue sizing.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum live sessions (None for unbounded)
    pub max_sessions: Option<usize>,
    /// Outbox capacity per session
    pub outbox_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: Some(32),
            outbox_capacity: 256,
        }
    }
}

/// Why a session could not be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("session registry is full ({0} live sessions)")]
    Full(usize),
    #[error("server is draining, no new sessions accepted")]
    ShuttingDown,
}

/// Directory of live sessions, keyed by id.
///
/// The map lock is held only for mutation and snapshotting, never across
/// channel I/O or observer calls. Constructed explicitly and passed to
/// every component that needs it, so multiple server instances can coexist
/// in one process.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    observers: Vec<Arc<dyn SessionObserver>>,
    accepting: AtomicBool,
    config: RegistryConfig,
}

impl SessionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            observers: Vec::new(),
            accepting: AtomicBool::new(true),
            config,
        }
    }

    /// Add a lifecycle observer. Observers are fixed before the registry is
    /// shared, and fire in the order they were added.
    pub fn add_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Allocate a fresh session and hand back its outbox receiver.
    pub fn register(
        &self,
    ) -> Result<(Arc<Session>, mpsc::Receiver<SppNotification>), RegisterError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(RegisterError::ShuttingDown);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let (session, rx) = Session::new(id, self.config.outbox_capacity);
        let session = Arc::new(session);

        {
            let mut sessions = self.sessions.write();
            if let Some(max) = self.config.max_sessions {
                if sessions.len() >= max {
                    return Err(RegisterError::Full(sessions.len()));
                }
            }
            sessions.insert(session.id().to_string(), session.clone());
        }

        info!("Session registered: {} (now {})", session.id(), self.len());
        self.notify_register(&session);
        Ok((session, rx))
    }

    /// Remove a session if present. A no-op for unknown ids, so racing
    /// disconnect paths can both call it safely; observers fire exactly
    /// once per live session.
    pub fn unregister(&self, session_id: &str) {
        let removed = self.sessions.write().remove(session_id);

        if let Some(session) = removed {
            session.close();
            info!("Session unregistered: {} (now {})", session.id(), self.len());
            self.notify_unregister(&session);
        } else {
            debug!("Unregister for unknown session: {session_id}");
        }
    }

    pub fn lookup(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Point-in-time copy of the live sessions, safe to iterate without
    /// holding the lock during delivery.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Stop accepting registrations. Entered when draining begins.
    pub fn close(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Force-close every remaining session (called during server shutdown).
    /// Returns how many were closed.
    pub fn shutdown_all(&self) -> usize {
        // Drain all entries while holding the lock briefly
        let drained: Vec<_> = {
            let mut sessions = self.sessions.write();
            sessions.drain().collect()
        };

        // Close channels and fire observers outside the lock
        let count = drained.len();
        for (_, session) in drained {
            session.close();
            self.notify_unregister(&session);
        }
        count
    }

    // ── Internal ──────────────────────────────────────────────────────────

    fn notify_register(&self, session: &Session) {
        for observer in &self.observers {
            if catch_unwind(AssertUnwindSafe(|| observer.on_register(session))).is_err() {
                warn!("Session observer panicked in on_register for {}", session.id());
            }
        }
    }

    fn notify_unregister(&self, session: &Session) {
        for observer in &self.observers {
            if catch_unwind(AssertUnwindSafe(|| observer.on_unregister(session))).is_err() {
                warn!("Session observer panicked in on_unregister for {}", session.id());
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
