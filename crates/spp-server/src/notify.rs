//! Notification fan-out — broadcast and unicast, independent of the
//! request/response cycle.

use std::sync::Arc;

use serde_json::Value;
use spp_protocol::{SppError, SppNotification};
use tracing::{debug, warn};

use crate::registry::SessionRegistry;
use crate::session::EnqueueError;

/// Pushes asynchronous payloads onto session outboxes. Cheap to clone;
/// any producer (timer, handler side-effect, external event) can hold one.
///
/// Delivery is best-effort, at-most-once: a payload enqueued to a session
/// that disconnects before delivery is silently dropped.
#[derive(Clone)]
pub struct Notifier {
    registry: Arc<SessionRegistry>,
}

impl Notifier {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Enqueue a notification on every session live at call time.
    /// Per-session failures are logged and skipped — one slow or vanished
    /// client never blocks delivery to the others. Returns how many
    /// outboxes accepted the payload.
    pub fn broadcast(&self, method: &str, params: Option<Value>) -> usize {
        let note = SppNotification::new(method, params);
        let snapshot = self.registry.snapshot();

        let mut delivered = 0;
        for session in &snapshot {
            match session.enqueue(note.clone()) {
                Ok(()) => delivered += 1,
                Err(EnqueueError::Full) => {
                    warn!("Outbox full for {}, dropping {}", session.id(), note.method);
                }
                Err(EnqueueError::Closed) => {
                    debug!("Push channel closed for {}, dropping {}", session.id(), note.method);
                }
            }
        }
        debug!(
            "Broadcast {} to {}/{} sessions",
            note.method,
            delivered,
            snapshot.len()
        );
        delivered
    }

    /// Enqueue a notification on exactly one session. Unknown targets are
    /// a recoverable error for the producer; enqueue failures after a
    /// successful lookup stay best-effort and are only logged.
    pub fn unicast(&self, session_id: &str, method: &str, params: Option<Value>) -> Result<(), SppError> {
        let Some(session) = self.registry.lookup(session_id) else {
            return Err(SppError::session_not_found(session_id));
        };

        let note = SppNotification::new(method, params);
        match session.enqueue(note) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Unicast {method} to {session_id} dropped: {e}");
                Ok(())
            }
        }
    }
}
